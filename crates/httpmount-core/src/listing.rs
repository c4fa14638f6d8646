//! Parser for auto-generated "Index of" directory listings.
//!
//! Web servers render a directory without an index document as an HTML page
//! whose `<pre>` block holds one line per child:
//!
//! ```text
//! <pre><img src="/icons/blank.gif" alt="Icon "> <a href="?C=N;O=D">Name</a> ... <a href="?C=M;O=A">Last modified</a> ...
//! <img src="/icons/folder.gif" alt="[DIR]"> <a href="sub/">sub/</a>                    01-Jan-2020 12:00    -
//! <img src="/icons/text.gif" alt="[TXT]"> <a href="a.txt">a.txt</a>                   02-Jan-2020 13:30  10K
//! <hr></pre>
//! ```
//!
//! The format is loosely specified, so the parser is strict: any line that
//! does not fit the expected shape fails the whole listing with a
//! [`ListingError`] rather than producing a partial or empty result.

use crate::cache::{DirectoryEntry, DirectoryListing, EntryKind};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Byte prefix that identifies a response body as a directory listing.
pub const LISTING_SIGNATURE: &[u8] = b"<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n<html>\n <head>\n  <title>Index of ";

const BLOCK_OPEN: &str = "<pre>";
const BLOCK_CLOSE: &str = "</pre>";
const TRAILER: &str = "<hr>";
const DIR_ICON: &str = "DIR";
const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Size unit suffixes, each 1024 times the previous.
const SIZE_UNITS: [&str; 6] = ["", "K", "M", "G", "T", "P"];

static ENTRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^<img src="[^"]+" alt="\[(?P<icon>[^"]+)\]"> "#,
        r#"<a href="(?P<url>[^"]+)">(?P<name>[^<]+)</a>\s*"#,
        r"(?P<date>\d+-\w+-\d+)\s+(?P<time>\d+:\d+)\s+",
        r"(?P<size>[0-9.]+|-)(?P<unit>\w?)\s*$",
    ))
    .expect("entry line pattern is valid")
});

/// Structural violations found while parsing a listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("expected exactly one '{marker}' marker, found {count}")]
    MarkerCount { marker: &'static str, count: usize },

    #[error("listing block is empty")]
    EmptyBlock,

    #[error("header line must name 'Name' and 'Last modified' exactly once: {line:?}")]
    BadHeader { line: String },

    #[error("listing block must end with '<hr>', found {line:?}")]
    MissingTrailer { line: String },

    #[error("unrecognized entry line: {line:?}")]
    BadEntry { line: String },

    #[error("link target {href:?} does not match visible name {name:?}")]
    HrefMismatch { href: String, name: String },

    #[error("icon [{icon}] disagrees with entry kind of {name:?}")]
    IconMismatch { icon: String, name: String },

    #[error("unparseable modification time {value:?}")]
    BadTimestamp { value: String },

    #[error("unparseable size {value:?}")]
    BadSize { value: String },
}

/// Returns true if `body` starts with the listing signature.
#[inline]
pub fn is_listing(body: &[u8]) -> bool {
    body.starts_with(LISTING_SIGNATURE)
}

/// Parses a listing page into its ordered entries.
///
/// The caller is expected to have checked [`is_listing`] first; this
/// function only validates the `<pre>` block.
pub fn parse_listing(text: &str) -> Result<DirectoryListing, ListingError> {
    let block = extract_block(text)?;
    let lines: Vec<&str> = block.lines().collect();

    let (header, rest) = lines.split_first().ok_or(ListingError::EmptyBlock)?;
    if header.matches("Name").count() != 1 || header.matches("Last modified").count() != 1 {
        return Err(ListingError::BadHeader {
            line: (*header).to_string(),
        });
    }

    let Some((trailer, entries)) = rest.split_last() else {
        return Err(ListingError::MissingTrailer {
            line: (*header).to_string(),
        });
    };
    if *trailer != TRAILER {
        return Err(ListingError::MissingTrailer {
            line: (*trailer).to_string(),
        });
    }

    let mut listing = DirectoryListing::new();
    for line in entries {
        let entry = parse_entry(line)?;
        listing.insert(entry);
    }
    Ok(listing)
}

fn extract_block(text: &str) -> Result<&str, ListingError> {
    for marker in [BLOCK_OPEN, BLOCK_CLOSE] {
        let count = text.matches(marker).count();
        if count != 1 {
            return Err(ListingError::MarkerCount { marker, count });
        }
    }

    let start = text.find(BLOCK_OPEN).map(|i| i + BLOCK_OPEN.len());
    let end = text.find(BLOCK_CLOSE);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => Ok(&text[start..end]),
        _ => Err(ListingError::MarkerCount {
            marker: BLOCK_CLOSE,
            count: 0,
        }),
    }
}

fn parse_entry(line: &str) -> Result<DirectoryEntry, ListingError> {
    let caps = ENTRY_LINE.captures(line).ok_or_else(|| ListingError::BadEntry {
        line: line.to_string(),
    })?;

    let icon = &caps["icon"];
    let href = &caps["url"];
    let name = &caps["name"];
    if href != name {
        return Err(ListingError::HrefMismatch {
            href: href.to_string(),
            name: name.to_string(),
        });
    }

    let is_dir = name.ends_with('/');
    if is_dir != (icon == DIR_ICON) {
        return Err(ListingError::IconMismatch {
            icon: icon.to_string(),
            name: name.to_string(),
        });
    }

    let modified = parse_timestamp(&caps["date"], &caps["time"])?;
    let (kind, size) = if is_dir {
        (EntryKind::Directory, 0)
    } else {
        (EntryKind::File, parse_size(&caps["size"], &caps["unit"])?)
    };

    Ok(DirectoryEntry {
        name: name.trim_end_matches('/').to_string(),
        kind,
        size,
        modified,
    })
}

/// Parses the `DD-Mon-YYYY HH:MM` modification stamp as UTC.
fn parse_timestamp(date: &str, time: &str) -> Result<SystemTime, ListingError> {
    let value = format!("{date} {time}");
    let parsed = NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .map_err(|_| ListingError::BadTimestamp {
            value: value.clone(),
        })?;

    let secs = parsed.and_utc().timestamp();
    let stamp = match u64::try_from(secs) {
        Ok(secs) => UNIX_EPOCH.checked_add(Duration::from_secs(secs)),
        Err(_) => UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs())),
    };
    stamp.ok_or(ListingError::BadTimestamp { value })
}

/// Decodes a listing size column into bytes.
///
/// `-` is the directory placeholder and decodes to 0. Otherwise `number` is
/// a decimal value and `unit` one of `""`, `K`, `M`, `G`, `T`, `P`. Displayed
/// sizes are rounded, so a 0.1 bias is added before flooring to keep exact
/// multiples from landing one byte short.
///
/// ```
/// use httpmount_core::listing::parse_size;
///
/// assert_eq!(parse_size("-", "").unwrap(), 0);
/// assert_eq!(parse_size("10", "K").unwrap(), 10_240);
/// assert_eq!(parse_size("1.5", "M").unwrap(), 1_572_864);
/// ```
pub fn parse_size(number: &str, unit: &str) -> Result<u64, ListingError> {
    if number == "-" {
        return Ok(0);
    }

    let bad_size = || ListingError::BadSize {
        value: format!("{number}{unit}"),
    };
    let rank = SIZE_UNITS.iter().position(|u| *u == unit).ok_or_else(bad_size)?;
    let raw: f64 = number.parse().map_err(|_| bad_size())?;

    let scaled = raw * 1024f64.powi(i32::try_from(rank).map_err(|_| bad_size())?) + 0.1;
    if !scaled.is_finite() || scaled < 0.0 || scaled >= u64::MAX as f64 {
        return Err(bad_size());
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(scaled.floor() as u64)
}
