//! Per-record LLM enrichment.
//!
//! Two independent generator calls per record:
//! 1. Summary: description → JSON object merged into the record
//!    (`summary`, `topics`, `fees`, `requirement`, ...).
//! 2. Deadline: raw deadline text → normalized date string.
//!
//! A failure in either step is logged with the record title and leaves the
//! fields that step would have written untouched. The record itself is
//! always returned.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use artcallfinder_generator::Generator;
use artcallfinder_shared::{ArtCallError, PromptTemplates, Record, Result, build_prompt};

use crate::validate::{RetryPolicy, generate_valid_json};

/// Enriches records using a shared generator.
pub struct Enricher {
    generator: Arc<dyn Generator>,
    prompts: PromptTemplates,
    retry: RetryPolicy,
}

impl Enricher {
    pub fn new(generator: Arc<dyn Generator>, prompts: PromptTemplates, retry: RetryPolicy) -> Self {
        Self {
            generator,
            prompts,
            retry,
        }
    }

    /// Apply best-effort enrichment and return the updated record.
    #[instrument(skip_all, fields(title = %record.title()))]
    pub async fn enrich(&self, mut record: Record) -> Record {
        if let Some(description) = record.non_empty_str("description").map(str::to_owned) {
            match self.summarize(&description).await {
                Ok(fields) => {
                    debug!(fields = fields.len(), "merging summary fields");
                    record.merge(fields);
                }
                Err(e) => {
                    warn!(title = %record.title(), error = %e, "summary enrichment failed");
                }
            }
        }

        if let Some(deadline) = record.non_empty_str("deadline").map(str::to_owned) {
            match self.normalize_deadline(&deadline).await {
                Ok(normalized) => record.set("deadline", normalized),
                Err(e) => {
                    warn!(
                        title = %record.title(),
                        deadline = %deadline,
                        error = %e,
                        "deadline normalization failed"
                    );
                }
            }
        }

        record
    }

    async fn summarize(&self, description: &str) -> Result<Map<String, Value>> {
        let prompt = build_prompt(&self.prompts.summarize_description, description);
        let cleaned = generate_valid_json(self.generator.as_ref(), &prompt, &self.retry).await?;

        match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(ArtCallError::parse(format!(
                "summary must be a JSON object, got: {other}"
            ))),
            Err(e) => Err(ArtCallError::malformed(e.to_string(), cleaned)),
        }
    }

    async fn normalize_deadline(&self, deadline: &str) -> Result<String> {
        let prompt = build_prompt(&self.prompts.normalize_deadline, deadline);
        let text = self.generator.generate_text(&prompt).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    type Reply = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

    /// Generator whose two capabilities answer through closures and record
    /// every prompt they receive.
    struct StubGenerator {
        structured: Reply,
        text: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        fn new(structured: Reply, text: Reply) -> Arc<Self> {
            Arc::new(Self {
                structured,
                text,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate_text(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.text)(prompt)
        }

        async fn generate_structured(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.structured)(prompt)
        }
    }

    fn prompts() -> PromptTemplates {
        PromptTemplates {
            summarize_description: "SUMMARIZE".into(),
            normalize_deadline: "DATE".into(),
        }
    }

    fn enricher(generator: Arc<StubGenerator>) -> Enricher {
        Enricher::new(
            generator,
            prompts(),
            RetryPolicy {
                max_retries: 3,
                delay: Duration::ZERO,
            },
        )
    }

    fn listing() -> Record {
        Record::new()
            .with("url", "https://example.org/call")
            .with("title", "Mural")
            .with("description", "Paint a wall downtown.")
            .with("deadline", "June 30th, 2025 at 5pm")
    }

    #[tokio::test]
    async fn merges_summary_and_normalizes_deadline() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> {
                Ok("```json\n{\"summary\":\"A mural.\",\"topics\":[\"mural\"],\"title\":\"Mural Call\"}\n```".into())
            }),
            Box::new(|_: &str| -> Result<String> { Ok("  2025-06-30\n".into()) }),
        );
        let record = enricher(generator.clone()).enrich(listing()).await;

        assert_eq!(record.get_str("summary"), Some("A mural."));
        assert_eq!(record.get("topics"), Some(&serde_json::json!(["mural"])));
        assert_eq!(record.title(), "Mural Call");
        assert_eq!(record.get_str("deadline"), Some("2025-06-30"));
        assert_eq!(record.get_str("description"), Some("Paint a wall downtown."));

        let sent = generator.prompts.lock().unwrap().clone();
        assert_eq!(sent[0], "SUMMARIZE\n\nPaint a wall downtown.");
        assert_eq!(sent[1], "DATE\n\nJune 30th, 2025 at 5pm");
    }

    #[tokio::test]
    async fn summary_failure_keeps_deadline_step() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> { Err(ArtCallError::generation("connection reset")) }),
            Box::new(|_: &str| -> Result<String> { Ok("2025-06-30".into()) }),
        );
        let record = enricher(generator).enrich(listing()).await;

        assert!(!record.contains_key("summary"));
        assert_eq!(record.get_str("deadline"), Some("2025-06-30"));
        assert_eq!(record.url(), Some("https://example.org/call"));
    }

    #[tokio::test]
    async fn deadline_failure_keeps_raw_deadline_and_summary() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> { Ok("{\"summary\":\"ok\"}".into()) }),
            Box::new(|_: &str| -> Result<String> { Err(ArtCallError::generation("HTTP 500")) }),
        );
        let record = enricher(generator).enrich(listing()).await;

        assert_eq!(record.get_str("summary"), Some("ok"));
        assert_eq!(record.get_str("deadline"), Some("June 30th, 2025 at 5pm"));
    }

    #[tokio::test]
    async fn exhausted_validation_leaves_record_unenriched() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> { Ok("not json".into()) }),
            Box::new(|_: &str| -> Result<String> { Ok("2025-06-30".into()) }),
        );
        let original = listing();
        let record = enricher(generator.clone()).enrich(original.clone()).await;

        assert!(!record.contains_key("summary"));
        assert_eq!(record.get_str("deadline"), Some("2025-06-30"));
        // three structured attempts plus one date call
        assert_eq!(generator.prompts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn non_object_summary_is_rejected() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> { Ok("[\"a\", \"b\"]".into()) }),
            Box::new(|_: &str| -> Result<String> { Ok("2025-06-30".into()) }),
        );
        let record = enricher(generator).enrich(listing()).await;
        assert!(!record.contains_key("summary"));
        assert_eq!(record.len(), listing().len());
    }

    #[tokio::test]
    async fn skips_steps_without_input() {
        let generator = StubGenerator::new(
            Box::new(|_: &str| -> Result<String> { panic!("summary should not be requested") }),
            Box::new(|_: &str| -> Result<String> { panic!("deadline should not be requested") }),
        );
        let record = Record::new()
            .with("url", "u")
            .with("description", "")
            .with("title", "Empty");
        let enriched = enricher(generator).enrich(record.clone()).await;
        assert_eq!(enriched, record);
    }
}
