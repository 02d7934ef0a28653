//! Arizona Commission on the Arts opportunities search.
//!
//! Paginated via `sf_paged`. Listing pages only carry `h3` headings with
//! links; organization and deadline come from labelled lines in the detail
//! page's `#content` block.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument};

use artcallfinder_shared::{Record, Result};

use super::{NOT_AVAILABLE, SourceScraper, fetch_description};
use crate::engine::{ScrapeContext, clean_text, fetch_html, inline_text, joined_text, resolve_link};

const LISTING_URL: &str =
    "https://azarts.gov/opportunities/arts-opportunities/?sort_order=date+desc";

static ORGANIZATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Organization/Company:\s*(.*)").unwrap());
static DEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Deadline:\s*(.*)").unwrap());

/// Scraper for `azarts.gov`.
pub struct AzArtsCouncilScraper {
    listing_url: String,
}

impl AzArtsCouncilScraper {
    pub fn new() -> Self {
        Self::with_listing_url(LISTING_URL)
    }

    /// Point the scraper at a different listing search (mirrors, tests).
    pub fn with_listing_url(url: impl Into<String>) -> Self {
        Self {
            listing_url: url.into(),
        }
    }

    fn page_url(&self, page: u32) -> String {
        let sep = if self.listing_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}sf_paged={page}", self.listing_url)
    }
}

impl Default for AzArtsCouncilScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// What a listing page told us.
#[derive(Debug, PartialEq)]
enum ListingPage {
    /// The search ran past the last page.
    NoResults,
    /// Headings with links: (title, url).
    Listings(Vec<(String, String)>),
}

fn parse_listing_page(body: &str, page_url: &str) -> ListingPage {
    let doc = Html::parse_document(body);

    if doc.root_element().text().any(|t| t.contains("No Results Found")) {
        return ListingPage::NoResults;
    }

    let heading_sel = Selector::parse("h3").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let listings = doc
        .select(&heading_sel)
        .filter_map(|h3| {
            // Headings without a link are page chrome ("Search Arts Opportunities").
            let href = h3.select(&link_sel).next()?.value().attr("href")?;
            Some((clean_text(&inline_text(h3)), resolve_link(page_url, href)))
        })
        .collect();

    ListingPage::Listings(listings)
}

fn extract_description(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("#content").unwrap();
    doc.select(&sel).next().map(|el| clean_text(&joined_text(el)))
}

/// First line following a label such as `Deadline:`.
fn labelled_line(description: &str, re: &Regex) -> Option<String> {
    re.captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str().trim()))
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl SourceScraper for AzArtsCouncilScraper {
    fn name(&self) -> &str {
        "AZ_arts_council"
    }

    #[instrument(skip_all, fields(source = "AZ_arts_council", max_pages = ?ctx.max_pages))]
    async fn scrape(&self, ctx: &ScrapeContext) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            if ctx.past_page_limit(page) {
                info!(page, "reached max pages limit, stopping scrape");
                break;
            }

            let url = self.page_url(page);
            info!(%url, "fetching opportunities page");
            let body = match fetch_html(&ctx.client, &url).await {
                Ok(body) => body,
                Err(e) => {
                    error!(error = %e, "error fetching the listing page");
                    break;
                }
            };

            let listings = match parse_listing_page(&body, &url) {
                ListingPage::NoResults => {
                    info!(page, "no results found, ending scrape");
                    break;
                }
                ListingPage::Listings(listings) if listings.is_empty() => {
                    info!(page, "no listings found, ending scrape");
                    break;
                }
                ListingPage::Listings(listings) => listings,
            };
            info!(page, count = listings.len(), "processing listings");

            for (title, url) in listings {
                if ctx.is_known(&url) {
                    debug!(%url, "skipping already processed URL");
                    continue;
                }

                info!(%title, "scraping details");
                let description = fetch_description(ctx, &url, extract_description).await;
                let organization = labelled_line(&description, &ORGANIZATION_RE)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                let deadline = labelled_line(&description, &DEADLINE_RE)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());

                records.push(
                    Record::new()
                        .with("title", title)
                        .with("organization", organization)
                        .with("location", NOT_AVAILABLE)
                        .with("deadline", deadline)
                        .with("url", url)
                        .with("description", description),
                );
            }

            page += 1;
        }

        info!(count = records.len(), "scraping finished");
        Ok(records)
    }
}
