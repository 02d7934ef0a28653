//! Core domain types for ArtCallFinder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One scraped opportunity listing plus any enrichment fields.
///
/// Stored as an open JSON object: scrapers and the generator decide which
/// fields exist. Identity is the `url` field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style string field setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Identifier, if the record has a string `url`.
    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    /// Title for diagnostics; empty when absent.
    pub fn title(&self) -> &str {
        self.get_str("title").unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String value of `key` if present and non-empty.
    pub fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.get_str(key).filter(|s| !s.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Overwrite-by-key union: every field of `fields` lands on the record,
    /// fields not mentioned are kept.
    pub fn merge(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.0.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// PromptTemplates
// ---------------------------------------------------------------------------

const DEFAULT_SUMMARIZE_PROMPT: &str = "You are given the description of an art call \
(an open call, grant, or commission for artists). Return ONLY a JSON object with the keys \
\"summary\" (two or three sentences), \"topics\" (array of short English topic strings), \
\"fees\" (application fee, or \"None\"), and \"requirement\" (eligibility requirements in \
one sentence). Do not wrap the JSON in markdown.";

const DEFAULT_DEADLINE_PROMPT: &str = "Convert the following application deadline into a \
single date formatted as YYYY-MM-DD. Reply with the date only. If no date can be determined, \
reply with the text unchanged.";

/// Prompt templates loaded from `prompts.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplates {
    /// Prepended to a record description for summary enrichment.
    #[serde(default = "default_summarize_prompt")]
    pub summarize_description: String,

    /// Prepended to raw deadline text for date normalization.
    #[serde(default = "default_deadline_prompt")]
    pub normalize_deadline: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            summarize_description: default_summarize_prompt(),
            normalize_deadline: default_deadline_prompt(),
        }
    }
}

fn default_summarize_prompt() -> String {
    DEFAULT_SUMMARIZE_PROMPT.into()
}
fn default_deadline_prompt() -> String {
    DEFAULT_DEADLINE_PROMPT.into()
}

/// Join a template and its subject with a blank line, template first.
pub fn build_prompt(template: &str, subject: &str) -> String {
    format!("{template}\n\n{subject}")
}
