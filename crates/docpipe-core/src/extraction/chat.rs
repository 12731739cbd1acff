//! Extraction through an OpenAI-compatible chat completions service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{parse_invoice_reply, DocumentExtractor, ExtractionOptions, Result};
use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::InvoiceData;

/// Sends document text to a chat completions endpoint and parses the JSON reply.
pub struct ChatCompletionsExtractor {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsExtractor {
    /// Build an extractor from configuration. Requires an endpoint.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ExtractionError::NotConfigured("endpoint is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Service(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    async fn document_text(document: &[u8]) -> Result<String> {
        let bytes = document.to_vec();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractionError::Document(e.to_string()))?
            .map_err(|e| ExtractionError::Document(e.to_string()))
    }
}

#[async_trait]
impl DocumentExtractor for ChatCompletionsExtractor {
    #[instrument(skip_all, fields(url = %self.url, bytes = document.len()))]
    async fn extract(&self, document: &[u8], options: &ExtractionOptions) -> Result<Option<InvoiceData>> {
        let model = options
            .deployment
            .as_deref()
            .ok_or_else(|| ExtractionError::NotConfigured("deployment is not set".to_string()))?;

        let text = Self::document_text(document).await?;
        debug!(chars = text.len(), "extracted document text");

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: options.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("{}\n\n{}", options.extraction_prompt, text),
                },
            ],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExtractionError::Service(e.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Response(e.to_string()))?;

        match body.choices.into_iter().next().and_then(|c| c.message.content) {
            Some(content) => parse_invoice_reply(&content),
            None => Ok(None),
        }
    }
}
