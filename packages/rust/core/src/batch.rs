//! Bounded-concurrency batch enrichment.
//!
//! One tokio task per record, at most `concurrency` running at once. Results
//! are collected in completion order through a [`JoinSet`]; the only shared
//! state between tasks is the semaphore and the enrichment function itself.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, instrument, warn};

use artcallfinder_shared::{ArtCallError, Record, Result};

/// Outcome of a batch: every input record lands in exactly one list.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Enriched records, in completion order.
    pub succeeded: Vec<Record>,
    /// Original records whose task failed, with the failure.
    pub failed: Vec<(Record, ArtCallError)>,
}

impl BatchOutcome {
    /// Total records accounted for.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for enrichment operations.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Task-level progress within the current phase.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
    /// Called when the current phase has no more work.
    fn finish(&self) {}
}

/// No-op enrichment progress.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Run `enrich_fn` over every record with at most `concurrency` in flight.
///
/// An `Err` from `enrich_fn`, or a panic inside it, puts the original record
/// into [`BatchOutcome::failed`]; sibling tasks are unaffected.
#[instrument(skip_all, fields(records = records.len(), concurrency = concurrency))]
pub async fn process_batch<F, Fut>(
    records: Vec<Record>,
    concurrency: usize,
    enrich_fn: F,
    progress: &dyn EnrichmentProgress,
) -> BatchOutcome
where
    F: Fn(Record) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Record>> + Send + 'static,
{
    let total = records.len();
    let enrich_fn = Arc::new(enrich_fn);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    // Originals, by submission index, until their task reports back.
    let mut pending: Vec<Option<Record>> = Vec::with_capacity(total);
    let mut tasks = JoinSet::new();

    for (index, record) in records.into_iter().enumerate() {
        pending.push(Some(record.clone()));

        let enrich_fn = enrich_fn.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let title = record.title().to_string();

            // Inner task so a panicking enrichment is reported against its record.
            let result = match tokio::spawn(enrich_fn(record)).await {
                Ok(result) => result,
                Err(e) => Err(ArtCallError::BatchTask {
                    title,
                    message: describe_join_error(e),
                }),
            };
            (index, result)
        });
    }

    let mut outcome = BatchOutcome::default();
    let mut completed = 0;

    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                // Leftover originals are recovered after the loop.
                warn!(error = %e, "enrichment task aborted");
                continue;
            }
        };

        completed += 1;
        let original = pending[index].take();

        match result {
            Ok(record) => {
                progress.task_progress(completed, total, record.title());
                outcome.succeeded.push(record);
            }
            Err(e) => {
                let original = original.unwrap_or_default();
                warn!(title = %original.title(), error = %e, "enrichment task failed");
                progress.task_progress(completed, total, original.title());
                outcome.failed.push((original, e));
            }
        }
    }

    for original in pending.into_iter().flatten() {
        let title = original.title().to_string();
        warn!(%title, "enrichment task never reported back");
        outcome.failed.push((
            original,
            ArtCallError::BatchTask {
                title,
                message: "task aborted".into(),
            },
        ));
    }

    progress.finish();
    info!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "batch complete"
    );

    outcome
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{RetryPolicy, call_until_valid_json};
    use artcallfinder_shared::EnrichmentConfig;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new()
                    .with("url", format!("https://example.org/{i}"))
                    .with("title", format!("Call {i}"))
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_record_lands_once_despite_errors_and_panics() {
        let input = records(25);
        let outcome = process_batch(
            input.clone(),
            4,
            |record: Record| async move {
                let url = record.url().unwrap_or_default().to_string();
                let n: usize = url.rsplit('/').next().unwrap().parse().unwrap();
                match n % 5 {
                    0 => Err(ArtCallError::generation("boom")),
                    1 => panic!("enricher bug on {url}"),
                    _ => Ok(record.with("summary", "ok")),
                }
            },
            &SilentEnrichmentProgress,
        )
        .await;

        assert_eq!(outcome.len(), input.len());
        assert_eq!(outcome.succeeded.len(), 15);
        assert_eq!(outcome.failed.len(), 10);

        let mut seen: HashSet<String> = HashSet::new();
        for record in &outcome.succeeded {
            assert_eq!(record.get_str("summary"), Some("ok"));
            assert!(seen.insert(record.url().unwrap().to_string()));
        }
        for (record, err) in &outcome.failed {
            assert!(!record.contains_key("summary"));
            assert!(seen.insert(record.url().unwrap().to_string()));
            match err {
                ArtCallError::Generation(_) => {}
                ArtCallError::BatchTask { title, message } => {
                    assert_eq!(title, record.title());
                    assert!(message.contains("enricher bug"));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn respects_concurrency_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (f, p) = (in_flight.clone(), peak.clone());
        let outcome = process_batch(
            records(12),
            3,
            move |record: Record| {
                let (in_flight, peak) = (f.clone(), p.clone());
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(record)
                }
            },
            &SilentEnrichmentProgress,
        )
        .await;

        assert_eq!(outcome.succeeded.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn empty_batch() {
        let outcome = process_batch(
            Vec::new(),
            EnrichmentConfig::default().concurrency,
            |record: Record| async move { Ok(record) },
            &SilentEnrichmentProgress,
        )
        .await;
        assert!(outcome.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn retry_pauses_overlap_across_tasks() {
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(200),
        };

        let start = Instant::now();
        let outcome = process_batch(
            records(6),
            6,
            move |record: Record| async move {
                let result =
                    call_until_valid_json(&policy, || async { Ok("not json".to_string()) }).await;
                assert!(matches!(
                    result,
                    Err(ArtCallError::ValidationExhausted { attempts: 3 })
                ));
                Ok(record)
            },
            &SilentEnrichmentProgress,
        )
        .await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.succeeded.len(), 6);
        // Two pauses per record, none after the final attempt, all records at once.
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let outcome = process_batch(
            records(3),
            0,
            |record: Record| async move { Ok(record) },
            &SilentEnrichmentProgress,
        )
        .await;
        assert_eq!(outcome.succeeded.len(), 3);
    }

    struct CountingProgress {
        updates: Mutex<Vec<(usize, usize)>>,
        finished: AtomicUsize,
    }

    impl EnrichmentProgress for CountingProgress {
        fn phase(&self, _name: &str) {}
        fn task_progress(&self, current: usize, total: usize, _detail: &str) {
            self.updates.lock().unwrap().push((current, total));
        }
        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn reports_progress_per_task() {
        let progress = CountingProgress {
            updates: Mutex::new(Vec::new()),
            finished: AtomicUsize::new(0),
        };
        process_batch(
            records(4),
            2,
            |record: Record| async move { Ok(record) },
            &progress,
        )
        .await;

        let updates = progress.updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }
}
