//! Page fetching and text helpers shared by the site scrapers.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::ElementRef;
use tracing::debug;
use url::Url;

use artcallfinder_shared::{ArtCallError, Result};

/// Some listing sites reject non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Inputs every scraper run receives.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub client: Client,
    /// Cap on paginated listing pages. `None` or `Some(0)` means follow
    /// pagination to the end.
    pub max_pages: Option<u32>,
    /// URLs already in the processed collection; their detail pages are not fetched.
    pub known_urls: HashSet<String>,
}

impl ScrapeContext {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_pages: None,
            known_urls: HashSet::new(),
        }
    }

    pub fn is_known(&self, url: &str) -> bool {
        self.known_urls.contains(url)
    }

    /// Whether `page` (1-based) lies beyond the configured page cap.
    pub fn past_page_limit(&self, page: u32) -> bool {
        self.max_pages.is_some_and(|max| max > 0 && page > max)
    }
}

/// Build the HTTP client used for all listing and detail requests.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ArtCallError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetch a page body, failing on transport errors and non-2xx statuses.
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    debug!(%url, "fetching page");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ArtCallError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ArtCallError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| ArtCallError::Network(format!("{url}: body read failed: {e}")))
}

/// Replace unusual line terminators and drop non-printable characters.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{2028}' | '\u{2029}' => Some('\n'),
            '\u{a0}' => Some(' '),
            '\n' | '\r' | '\t' | ' '..='~' => Some(c),
            _ => None,
        })
        .collect()
}

/// Text of an element with each text node trimmed, blanks dropped, and one
/// node per line.
pub(crate) fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Element text collapsed onto one line.
pub(crate) fn inline_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an `href` against the page it was found on.
pub(crate) fn resolve_link(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
