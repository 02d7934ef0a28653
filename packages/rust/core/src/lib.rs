//! Core stages for ArtCallFinder.
//!
//! Structured-output validation, per-record enrichment, bounded-concurrency
//! batch processing, the url dedup gate, and the scrape/summarize stages that
//! connect them to the record store.

pub mod batch;
pub mod dedup;
pub mod enrichment;
pub mod pipeline;
pub mod validate;

pub use batch::{BatchOutcome, EnrichmentProgress, SilentEnrichmentProgress, process_batch};
pub use dedup::{existing_urls, merge_by_url, select_new};
pub use enrichment::Enricher;
pub use pipeline::{ScrapeSummary, SourceSummary, run_scrapers, run_summarize, summarize_source};
pub use validate::{RetryPolicy, call_until_valid_json, generate_valid_json, validate_and_clean};
