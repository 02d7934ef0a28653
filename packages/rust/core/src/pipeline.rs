//! Stage orchestration: scrape → summarize.
//!
//! Export lives in its own crate; the CLI strings the three together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use artcallfinder_scrapers::{ScrapeContext, ScraperRegistry, build_client};
use artcallfinder_shared::{Record, Result};
use artcallfinder_storage::RecordStore;

use crate::batch::{EnrichmentProgress, process_batch};
use crate::dedup::{existing_urls, merge_by_url, select_new};
use crate::enrichment::Enricher;

/// Per-source result of the scrape stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSummary {
    pub source: String,
    /// Records written to the raw file.
    pub scraped: usize,
    /// Raw file, when one was written.
    pub path: Option<PathBuf>,
}

/// Per-source result of the summarize stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source: String,
    /// Records read from the raw file.
    pub processed: usize,
    /// Raw records not seen before, sent to enrichment.
    pub new: usize,
    /// Size of the processed collection after the merge.
    pub total: usize,
    /// New records that failed enrichment and were stored as scraped.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

/// Run every registered scraper and write its raw collection.
///
/// Urls already present in a source's processed file are handed to the
/// scraper so their detail pages are not fetched again. A scraper error is
/// logged and the next source still runs; storage errors propagate.
#[instrument(skip_all, fields(sources = registry.len(), max_pages = ?max_pages))]
pub async fn run_scrapers(
    registry: &ScraperRegistry,
    store: &RecordStore,
    max_pages: Option<u32>,
) -> Result<Vec<ScrapeSummary>> {
    let client = build_client()?;
    let mut summaries = Vec::with_capacity(registry.len());

    for scraper in registry.iter() {
        let source = scraper.name().to_string();
        let start = Instant::now();

        let mut ctx = ScrapeContext::new(client.clone());
        ctx.max_pages = max_pages;
        ctx.known_urls = existing_urls(&store.load_processed(&source)?);

        let records = match scraper.scrape(&ctx).await {
            Ok(records) => records,
            Err(e) => {
                error!(%source, error = %e, "scraper failed");
                Vec::new()
            }
        };

        let path = if records.is_empty() {
            warn!(%source, "no records scraped, raw file left untouched");
            None
        } else {
            Some(store.save_raw(&source, &records)?)
        };

        info!(
            %source,
            scraped = records.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "scrape complete"
        );
        summaries.push(ScrapeSummary {
            source,
            scraped: records.len(),
            path,
        });
    }

    Ok(summaries)
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

/// Enrich the unseen raw records of one source and fold them into its
/// processed file.
///
/// Records whose enrichment task failed are stored un-enriched so the next
/// run does not pick them up again.
#[instrument(skip_all, fields(source = %source))]
pub async fn summarize_source(
    store: &RecordStore,
    source: &str,
    enricher: Arc<Enricher>,
    concurrency: usize,
    progress: &dyn EnrichmentProgress,
) -> Result<SourceSummary> {
    let raw = store.load_raw(source)?;
    let existing = store.load_processed(source)?;
    let fresh = select_new(&raw, &existing);

    info!(raw = raw.len(), existing = existing.len(), new = fresh.len(), "deduplicated");

    if fresh.is_empty() {
        return Ok(SourceSummary {
            source: source.to_string(),
            processed: raw.len(),
            new: 0,
            total: existing.len(),
            failed: 0,
        });
    }

    progress.phase(&format!("Summarizing {source}"));
    let new = fresh.len();
    let outcome = process_batch(
        fresh,
        concurrency,
        move |record: Record| {
            let enricher = enricher.clone();
            async move { Ok(enricher.enrich(record).await) }
        },
        progress,
    )
    .await;

    let failed = outcome.failed.len();
    let mut additions = outcome.succeeded;
    additions.extend(outcome.failed.into_iter().map(|(record, _)| record));

    let merged = merge_by_url(existing, additions);
    store.save_processed(source, &merged)?;

    Ok(SourceSummary {
        source: source.to_string(),
        processed: raw.len(),
        new,
        total: merged.len(),
        failed,
    })
}

/// [`summarize_source`] for every source with a raw file.
pub async fn run_summarize(
    store: &RecordStore,
    enricher: Arc<Enricher>,
    concurrency: usize,
    progress: &dyn EnrichmentProgress,
) -> Result<Vec<SourceSummary>> {
    let sources = store.list_raw_sources()?;
    if sources.is_empty() {
        warn!("no raw data found, nothing to summarize");
    }

    let mut summaries = Vec::with_capacity(sources.len());
    for source in sources {
        let summary =
            summarize_source(store, &source, enricher.clone(), concurrency, progress).await?;
        info!(
            source = %summary.source,
            processed = summary.processed,
            new = summary.new,
            total = summary.total,
            failed = summary.failed,
            "source summarized"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::SilentEnrichmentProgress;
    use crate::validate::RetryPolicy;
    use artcallfinder_generator::Generator;
    use artcallfinder_scrapers::SourceScraper;
    use artcallfinder_shared::{ArtCallError, PromptTemplates};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    /// Summarizes everything except descriptions mentioning "broken".
    struct FixedGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("2025-06-30".into())
        }

        async fn generate_structured(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("broken") {
                return Err(ArtCallError::generation("upstream 500"));
            }
            Ok(r#"{"summary": "short", "topics": ["mural"]}"#.into())
        }
    }

    fn temp_store() -> (PathBuf, RecordStore) {
        let root = std::env::temp_dir().join(format!("acf-pipeline-test-{}", Uuid::now_v7()));
        let store = RecordStore::new(root.join("raw"), root.join("processed"));
        (root, store)
    }

    fn enricher(generator: Arc<FixedGenerator>) -> Arc<Enricher> {
        Arc::new(Enricher::new(
            generator,
            PromptTemplates::default(),
            RetryPolicy {
                max_retries: 2,
                delay: Duration::ZERO,
            },
        ))
    }

    fn listing(url: &str, description: &str) -> Record {
        Record::new()
            .with("url", url)
            .with("title", format!("Call at {url}"))
            .with("description", description)
            .with("deadline", "end of June")
    }

    #[tokio::test]
    async fn second_run_finds_nothing_new() {
        let (root, store) = temp_store();
        let generator = Arc::new(FixedGenerator {
            calls: AtomicUsize::new(0),
        });

        store
            .save_processed("CA_arts_council", &[listing("u0", "old").with("summary", "done")])
            .unwrap();
        store
            .save_raw(
                "CA_arts_council",
                &[
                    listing("u0", "old"),
                    listing("u1", "Paint a wall"),
                    listing("u2", "broken listing"),
                ],
            )
            .unwrap();

        let summaries = run_summarize(
            &store,
            enricher(generator.clone()),
            4,
            &SilentEnrichmentProgress,
        )
        .await
        .unwrap();

        assert_eq!(
            summaries,
            vec![SourceSummary {
                source: "CA_arts_council".into(),
                processed: 3,
                new: 2,
                total: 3,
                failed: 0,
            }]
        );

        let processed = store.load_processed("CA_arts_council").unwrap();
        assert_eq!(existing_urls(&processed).len(), 3);
        let u1 = processed.iter().find(|r| r.url() == Some("u1")).unwrap();
        assert_eq!(u1.get_str("summary"), Some("short"));
        assert_eq!(u1.get_str("deadline"), Some("2025-06-30"));
        // The failed summary step keeps the record, un-summarized.
        let u2 = processed.iter().find(|r| r.url() == Some("u2")).unwrap();
        assert!(!u2.contains_key("summary"));
        assert_eq!(u2.get_str("deadline"), Some("2025-06-30"));

        let calls_after_first = generator.calls.load(Ordering::SeqCst);
        let again = run_summarize(&store, enricher(generator.clone()), 4, &SilentEnrichmentProgress)
            .await
            .unwrap();
        assert_eq!(again[0].new, 0);
        assert_eq!(again[0].total, 3);
        assert_eq!(generator.calls.load(Ordering::SeqCst), calls_after_first);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn summarize_without_raw_data_is_empty() {
        let (_root, store) = temp_store();
        let generator = Arc::new(FixedGenerator {
            calls: AtomicUsize::new(0),
        });
        let summaries = run_summarize(&store, enricher(generator), 2, &SilentEnrichmentProgress)
            .await
            .unwrap();
        assert!(summaries.is_empty());
    }

    /// Emits one listing per url it has not been told about.
    struct FakeScraper {
        name: &'static str,
        urls: Vec<&'static str>,
    }

    #[async_trait]
    impl SourceScraper for FakeScraper {
        fn name(&self) -> &str {
            self.name
        }

        async fn scrape(&self, ctx: &ScrapeContext) -> Result<Vec<Record>> {
            assert_eq!(ctx.max_pages, Some(2));
            Ok(self
                .urls
                .iter()
                .filter(|url| !ctx.is_known(url))
                .map(|url| listing(url, "text"))
                .collect())
        }
    }

    #[tokio::test]
    async fn scrapers_skip_known_urls_and_write_raw() {
        let (root, store) = temp_store();
        store
            .save_processed("fake_a", &[listing("a1", "seen")])
            .unwrap();

        let scrapers: Vec<Box<dyn SourceScraper>> = vec![
            Box::new(FakeScraper {
                name: "fake_a",
                urls: vec!["a1", "a2"],
            }),
            Box::new(FakeScraper {
                name: "fake_b",
                urls: vec![],
            }),
        ];
        let registry = ScraperRegistry::with_scrapers(scrapers);

        let summaries = run_scrapers(&registry, &store, Some(2)).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].scraped, 1);
        assert!(summaries[0].path.is_some());
        assert_eq!(summaries[1].scraped, 0);
        assert!(summaries[1].path.is_none());

        let raw = store.load_raw("fake_a").unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].url(), Some("a2"));
        assert_eq!(store.list_raw_sources().unwrap(), vec!["fake_a".to_string()]);

        let _ = std::fs::remove_dir_all(&root);
    }
}
