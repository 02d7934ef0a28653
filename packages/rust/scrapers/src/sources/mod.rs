//! Source scraper trait and built-in listing sites.
//!
//! Each scraper knows one site's listing layout and pagination and turns it
//! into raw [`Record`]s carrying `title`, `organization`, `location`,
//! `deadline`, `url`, and `description`.

mod az_arts_council;
mod ca_arts_council;

use async_trait::async_trait;
use tracing::{error, warn};

use artcallfinder_shared::{Record, Result};

use crate::engine::{ScrapeContext, fetch_html};

pub use az_arts_council::AzArtsCouncilScraper;
pub use ca_arts_council::CaArtsCouncilScraper;

/// Placeholder stored when a detail page lacks the expected content block.
pub(crate) const DESCRIPTION_NOT_FOUND: &str = "Description not found.";
/// Placeholder stored when a detail page could not be fetched.
pub(crate) const DESCRIPTION_UNAVAILABLE: &str = "Could not fetch details.";
/// Value used for fields a listing does not provide.
pub(crate) const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A scraper for one listing site.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Source name; also the stem of the raw and processed record files.
    fn name(&self) -> &str;

    /// Scrape the site's current listings.
    ///
    /// Listing-level fetch failures end the scrape early with whatever was
    /// collected so far. Detail-page failures keep the record with a
    /// placeholder description.
    async fn scrape(&self, ctx: &ScrapeContext) -> Result<Vec<Record>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered scrapers in run order.
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn SourceScraper>>,
}

impl ScraperRegistry {
    /// Create a registry with all built-in scrapers.
    pub fn new() -> Self {
        Self {
            scrapers: vec![
                Box::new(AzArtsCouncilScraper::new()),
                Box::new(CaArtsCouncilScraper::new()),
            ],
        }
    }

    /// Create a registry from an explicit scraper list.
    pub fn with_scrapers(scrapers: Vec<Box<dyn SourceScraper>>) -> Self {
        Self { scrapers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SourceScraper> {
        self.scrapers.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a detail page and pull its description with `extract`, falling
/// back to placeholder text so the listing is never dropped.
pub(crate) async fn fetch_description(
    ctx: &ScrapeContext,
    url: &str,
    extract: fn(&str) -> Option<String>,
) -> String {
    match fetch_html(&ctx.client, url).await {
        Ok(body) => extract(&body).unwrap_or_else(|| {
            warn!(%url, "could not find description on page");
            DESCRIPTION_NOT_FOUND.to_string()
        }),
        Err(e) => {
            error!(%url, error = %e, "error fetching detail page");
            DESCRIPTION_UNAVAILABLE.to_string()
        }
    }
}
