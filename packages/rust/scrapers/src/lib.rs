//! Listing-site scrapers for art call opportunities.
//!
//! This crate provides:
//! - [`engine`]: HTTP client, page fetching, and text cleanup shared by scrapers
//! - [`sources`]: Site-specific scrapers behind the [`SourceScraper`] trait
//! - [`ScraperRegistry`]: The built-in scrapers in run order

pub mod engine;
pub mod sources;

pub use engine::{ScrapeContext, build_client, clean_text, fetch_html};
pub use sources::{AzArtsCouncilScraper, CaArtsCouncilScraper, ScraperRegistry, SourceScraper};
