//! OpenAI Responses API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use artcallfinder_shared::{ArtCallError, OpenAiConfig, Result};

use crate::Generator;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("ArtCallFinder/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    /// Concatenate every `output_text` part, the way the official SDKs build
    /// their `output_text` convenience property.
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text {
            return Some(text);
        }

        let parts: Vec<String> = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }
}

/// Generator backed by the OpenAI Responses API.
pub struct OpenAiGenerator {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl OpenAiGenerator {
    /// Build a client from config and an already-resolved API key.
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(
            api_key,
            &config.model,
            &config.base_url,
            config.request_timeout(),
        )
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ArtCallError::generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| ArtCallError::config(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn respond(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/responses", self.base_url);

        debug!(model = %self.model, prompt_len = prompt.len(), "OpenAI responses request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&ResponsesRequest {
                model: &self.model,
                input: prompt,
            })
            .send()
            .await
            .map_err(|e| ArtCallError::generation(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ArtCallError::generation(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let reply: ResponsesReply = response
            .json()
            .await
            .map_err(|e| ArtCallError::generation(format!("invalid response body: {e}")))?;

        reply
            .into_text()
            .ok_or_else(|| ArtCallError::generation("no output text in OpenAI response"))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.respond(prompt).await
    }

    async fn generate_structured(&self, prompt: &str) -> Result<String> {
        self.respond(prompt).await
    }
}
