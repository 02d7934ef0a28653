//! Text-generation capability used for record enrichment.
//!
//! The [`Generator`] trait is the seam between the enrichment pipeline and
//! whichever model backs it. [`OpenAiGenerator`] talks to the OpenAI
//! Responses API; tests substitute their own implementations.

mod openai;

use async_trait::async_trait;

use artcallfinder_shared::Result;

pub use openai::OpenAiGenerator;

/// An opaque text-completion capability.
///
/// Implementations are shared read-only across enrichment workers, so
/// every call must be independent of the others.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Free-form text completion.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Completion expected to hold structured data. The text is returned
    /// raw; it may be wrapped in code fences or not parse at all.
    async fn generate_structured(&self, prompt: &str) -> Result<String>;
}
