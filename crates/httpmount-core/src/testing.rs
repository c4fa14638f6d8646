//! Test fixtures shared by the cache and the filesystem crates.
//!
//! - [`ListingPage`]: renders listing pages in the server's exact layout
//! - [`StaticFetcher`]: in-memory [`Fetcher`] that records every request

use crate::fetch::{FetchError, FetchResponse, Fetcher};
use crate::listing::LISTING_SIGNATURE;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Column header line that opens every listing block.
pub const HEADER_LINE: &str = r#"<img src="/icons/blank.gif" alt="Icon "> <a href="?C=N;O=D">Name</a>                    <a href="?C=M;O=A">Last modified</a>      <a href="?C=S;O=A">Size</a>  <a href="?C=D;O=A">Description</a><hr><img src="/icons/back.gif" alt="[PARENTDIR]"> <a href="/">Parent Directory</a>                             -   "#;

/// Builder for a listing page.
///
/// ```
/// use httpmount_core::testing::ListingPage;
/// use httpmount_core::parse_listing;
///
/// let page = ListingPage::new("/pub")
///     .dir("sub", "01-Jan-2020 12:00")
///     .file("a.txt", "02-Jan-2020 13:30", "10K")
///     .render();
/// let listing = parse_listing(&page).unwrap();
/// assert_eq!(listing.names().collect::<Vec<_>>(), ["sub", "a.txt"]);
/// ```
#[derive(Debug, Clone)]
pub struct ListingPage {
    title: String,
    lines: Vec<String>,
}

impl ListingPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    /// Adds a directory row. `name` is given without the trailing `/`.
    #[must_use]
    pub fn dir(self, name: &str, stamp: &str) -> Self {
        self.line(format!(
            r#"<img src="/icons/folder.gif" alt="[DIR]"> <a href="{name}/">{name}/</a>                    {stamp}    -   "#
        ))
    }

    /// Adds a file row with a size column such as `"512"` or `"1.5M"`.
    #[must_use]
    pub fn file(self, name: &str, stamp: &str, size: &str) -> Self {
        self.line(format!(
            r#"<img src="/icons/text.gif" alt="[TXT]"> <a href="{name}">{name}</a>                   {stamp}  {size}  "#
        ))
    }

    /// Adds a raw row verbatim.
    #[must_use]
    pub fn line(mut self, raw: impl Into<String>) -> Self {
        self.lines.push(raw.into());
        self
    }

    pub fn render(&self) -> String {
        let mut body = String::from_utf8_lossy(LISTING_SIGNATURE).into_owned();
        body.push_str(&self.title);
        body.push_str("</title>\n </head>\n <body>\n<h1>Index of ");
        body.push_str(&self.title);
        body.push_str("</h1>\n<pre>");
        body.push_str(HEADER_LINE);
        body.push('\n');
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str("<hr></pre>\n</body></html>\n");
        body
    }
}

enum Canned {
    Response(FetchResponse),
    Failure(String),
}

/// In-memory [`Fetcher`] keyed by URL path.
///
/// Unknown paths answer 404. Every request is recorded, so tests can assert
/// exactly how often the network would have been hit.
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Canned>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `page` with status 200 at `path`.
    #[must_use]
    pub fn page(self, path: &str, page: &ListingPage) -> Self {
        self.status(path, 200, page.render().into_bytes())
    }

    /// Serves `body` with status 200 at `path`.
    #[must_use]
    pub fn file(self, path: &str, body: impl Into<Vec<u8>>) -> Self {
        self.status(path, 200, body)
    }

    /// Serves `body` with an arbitrary status at `path`.
    #[must_use]
    pub fn status(mut self, path: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(
            path.to_string(),
            Canned::Response(FetchResponse::new(status, body.into())),
        );
        self
    }

    /// Fails requests for `path` without producing a response.
    #[must_use]
    pub fn failure(mut self, path: &str, message: &str) -> Self {
        self.responses
            .insert(path.to_string(), Canned::Failure(message.to_string()));
        self
    }

    /// All requested URL paths, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests made for `path`.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|p| *p == path).count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests().len()
    }
}

impl Fetcher for StaticFetcher {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let path = url.path().to_string();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(path.clone());
        }
        match self.responses.get(&path) {
            Some(Canned::Response(response)) => Ok(response.clone()),
            Some(Canned::Failure(message)) => Err(FetchError::Other {
                url: url.clone(),
                message: message.clone(),
            }),
            None => Ok(FetchResponse::new(404, Vec::new())),
        }
    }
}
