//! Structured-response validation with bounded retry.
//!
//! Generators do not reliably honor "return JSON" instructions: some wrap the
//! payload in markdown code fences, some return prose. Fences are stripped
//! here; anything that still fails to parse is treated as malformed output
//! and the call is repeated, unchanged, up to [`RetryPolicy::max_retries`]
//! times. Transport/API errors are returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use artcallfinder_generator::Generator;
use artcallfinder_shared::{ArtCallError, EnrichmentConfig, Result};

/// Attempt bound and pause for [`call_until_valid_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_retries: u32,
    /// Pause between attempts. Not applied after the final attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&EnrichmentConfig> for RetryPolicy {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay(),
        }
    }
}

/// Strip surrounding whitespace and a single layer of code fences
/// (`` ```json `` or bare `` ``` ``).
pub fn clean_structured_text(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Clean `raw` and confirm it parses as JSON. Single attempt.
pub fn validate_and_clean(raw: &str) -> Result<String> {
    let cleaned = clean_structured_text(raw);
    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(_) => Ok(cleaned.to_string()),
        Err(e) => Err(ArtCallError::malformed(format!("not valid JSON: {e}"), raw)),
    }
}

/// Invoke `call` until it yields text that [`validate_and_clean`] accepts.
///
/// Errors from `call` itself propagate without retry. Exhausting the
/// attempt bound yields [`ArtCallError::ValidationExhausted`].
pub async fn call_until_valid_json<F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let attempts = policy.max_retries.max(1);

    for attempt in 1..=attempts {
        let raw = call().await?;

        match validate_and_clean(&raw) {
            Ok(cleaned) => return Ok(cleaned),
            Err(e) if !e.is_retryable_output() => return Err(e),
            Err(e) => {
                warn!(
                    attempt,
                    max_retries = attempts,
                    raw = %raw,
                    error = %e,
                    "generator output is not valid JSON"
                );
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(ArtCallError::ValidationExhausted { attempts })
}

/// Ask `generator` for structured data, re-sending the identical prompt on
/// malformed output.
pub async fn generate_valid_json(
    generator: &dyn Generator,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    call_until_valid_json(policy, || generator.generate_structured(prompt)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn strips_json_fence() {
        let cleaned = validate_and_clean("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(cleaned, "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        assert_eq!(clean_structured_text("  ```\n[1, 2]\n```  \n"), "[1, 2]");
        assert_eq!(clean_structured_text("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(clean_structured_text("{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn prose_is_malformed() {
        let err = validate_and_clean("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(err.is_retryable_output());
        match err {
            ArtCallError::MalformedOutput { raw, .. } => {
                assert_eq!(raw, "Sure! Here is the JSON you asked for");
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_retries_calls() {
        let calls = AtomicUsize::new(0);
        let result = call_until_valid_json(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("not json".to_string()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(ArtCallError::ValidationExhausted { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let calls = AtomicUsize::new(0);
        let result = call_until_valid_json(&fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("I think the answer is".to_string())
                } else {
                    Ok("```json\n{\"summary\":\"ok\"}\n```".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "{\"summary\":\"ok\"}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result = call_until_valid_json(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ArtCallError::generation("HTTP 502")) }
        })
        .await;

        assert!(matches!(result, Err(ArtCallError::Generation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_still_attempts_once() {
        let calls = AtomicUsize::new(0);
        let result = call_until_valid_json(&fast_policy(0), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("nope".to_string()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(ArtCallError::ValidationExhausted { attempts: 1 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pauses_only_between_attempts() {
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(150),
        };
        let start = std::time::Instant::now();
        let result = call_until_valid_json(&policy, || async { Ok("nope".to_string()) }).await;

        assert!(matches!(
            result,
            Err(ArtCallError::ValidationExhausted { attempts: 2 })
        ));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[test]
    fn policy_from_config() {
        let config = EnrichmentConfig {
            concurrency: 2,
            max_retries: 5,
            retry_delay_ms: 250,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }
}
