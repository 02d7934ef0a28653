//! California Arts Council opportunities board.
//!
//! A single listing page of `li.job_listing` cards; the description lives in
//! `div.single_job_listing` on each detail page.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument, warn};

use artcallfinder_shared::{Record, Result};

use super::{NOT_AVAILABLE, SourceScraper, fetch_description};
use crate::engine::{ScrapeContext, fetch_html, inline_text, joined_text, resolve_link};

const LISTING_URL: &str =
    "https://arts.ca.gov/opportunities/?fwp_job_category_tags=artist-calls%2Cgrants";

/// Scraper for `arts.ca.gov`.
pub struct CaArtsCouncilScraper {
    listing_url: String,
}

impl CaArtsCouncilScraper {
    pub fn new() -> Self {
        Self::with_listing_url(LISTING_URL)
    }

    /// Point the scraper at a different listing page (mirrors, tests).
    pub fn with_listing_url(url: impl Into<String>) -> Self {
        Self {
            listing_url: url.into(),
        }
    }
}

impl Default for CaArtsCouncilScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing card fields, before the detail page is fetched.
#[derive(Debug, Clone, PartialEq)]
struct ListingCard {
    title: String,
    organization: String,
    location: String,
    deadline: String,
    url: String,
}

impl ListingCard {
    fn into_record(self, description: String) -> Record {
        Record::new()
            .with("title", self.title)
            .with("organization", self.organization)
            .with("location", self.location)
            .with("deadline", self.deadline)
            .with("url", self.url)
            .with("description", description)
    }
}

/// Split "Sacramento, CA | Deadline: June 30, 2025" into location and deadline.
fn split_location_deadline(text: &str) -> (String, String) {
    match text.split_once('|') {
        Some((location, rest)) => {
            let rest = rest.trim();
            let deadline = if rest.contains("Deadline:") {
                rest.replace("Deadline:", "").trim().to_string()
            } else {
                NOT_AVAILABLE.to_string()
            };
            (location.trim().to_string(), deadline)
        }
        None => (text.to_string(), NOT_AVAILABLE.to_string()),
    }
}

fn parse_listing_page(body: &str, page_url: &str) -> Vec<ListingCard> {
    let doc = Html::parse_document(body);
    let card_sel = Selector::parse("li.job_listing").unwrap();
    let title_sel = Selector::parse("h3").unwrap();
    let company_sel = Selector::parse("div.job_company").unwrap();
    let location_sel = Selector::parse("div.location").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let mut cards = Vec::new();
    for card in doc.select(&card_sel) {
        let title = card.select(&title_sel).next().map(inline_text);
        let href = card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"));

        let (Some(title), Some(href)) = (title, href) else {
            warn!("skipping a listing due to missing title or link");
            continue;
        };

        let organization = card
            .select(&company_sel)
            .next()
            .map(inline_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let (location, deadline) = match card.select(&location_sel).next() {
            Some(el) => split_location_deadline(&inline_text(el)),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };

        cards.push(ListingCard {
            title,
            organization,
            location,
            deadline,
            url: resolve_link(page_url, href),
        });
    }
    cards
}

fn extract_description(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("div.single_job_listing").unwrap();
    doc.select(&sel).next().map(joined_text)
}

#[async_trait]
impl SourceScraper for CaArtsCouncilScraper {
    fn name(&self) -> &str {
        "CA_arts_council"
    }

    #[instrument(skip_all, fields(source = "CA_arts_council"))]
    async fn scrape(&self, ctx: &ScrapeContext) -> Result<Vec<Record>> {
        info!(url = %self.listing_url, "fetching main opportunities page");
        let body = match fetch_html(&ctx.client, &self.listing_url).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "error fetching the listing page");
                return Ok(Vec::new());
            }
        };

        let cards = parse_listing_page(&body, &self.listing_url);
        if cards.is_empty() {
            warn!("no job listings found; the website structure may have changed");
            return Ok(Vec::new());
        }
        info!(count = cards.len(), "found art calls, scraping details");

        let mut records = Vec::with_capacity(cards.len());
        for card in cards {
            if ctx.is_known(&card.url) {
                debug!(url = %card.url, "skipping already processed URL");
                continue;
            }
            info!(title = %card.title, "scraping details");
            let description = fetch_description(ctx, &card.url, extract_description).await;
            records.push(card.into_record(description));
        }

        info!(count = records.len(), "scraping finished");
        Ok(records)
    }
}
