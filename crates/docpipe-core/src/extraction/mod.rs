//! Structured data extraction from invoice documents.

#[cfg(feature = "native")]
mod chat;

#[cfg(feature = "native")]
pub use chat::ChatCompletionsExtractor;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::InvoiceData;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Per-request extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    /// Instructions framing the model's role.
    pub system_prompt: String,
    /// Instruction describing the data to extract.
    pub extraction_prompt: String,
    /// Model or deployment name.
    pub deployment: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl ExtractionOptions {
    /// Options for extracting [`InvoiceData`], embedding its empty structure in the prompt.
    pub fn for_invoices(config: &ExtractionConfig) -> Self {
        let structure = serde_json::to_string(&InvoiceData::template()).unwrap_or_else(|_| "{}".to_string());

        Self {
            system_prompt: config.system_prompt.clone(),
            extraction_prompt: format!(
                "Extract the data from this invoice. If a value is not present, provide null. Use the following structure: {}",
                structure
            ),
            deployment: config.deployment.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// Trait for document data extractors.
///
/// `Ok(None)` means the document was read but no data came back.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &[u8], options: &ExtractionOptions) -> Result<Option<InvoiceData>>;
}

/// Parse a model reply into [`InvoiceData`].
///
/// Tolerates a reply wrapped in a Markdown code fence. A `null` reply yields `None`.
pub fn parse_invoice_reply(reply: &str) -> Result<Option<InvoiceData>> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if body.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Option<InvoiceData>>(body).map_err(|e| ExtractionError::Response(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_prompt_embeds_template() {
        let options = ExtractionOptions::for_invoices(&ExtractionConfig::default());
        assert!(options.extraction_prompt.starts_with("Extract the data from this invoice."));
        assert!(options.extraction_prompt.contains("\"products_signatures\""));
        assert_eq!(options.max_tokens, 4096);
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = r#"{"customer_name": "Acme", "total_price": 12.5}"#;
        let data = parse_invoice_reply(plain).unwrap().unwrap();
        assert_eq!(data.customer_name.as_deref(), Some("Acme"));
        assert_eq!(data.total_price, Some(Decimal::new(125, 1)));

        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(parse_invoice_reply(&fenced).unwrap(), Some(data));
    }

    #[test]
    fn test_parse_null_and_garbage() {
        assert_eq!(parse_invoice_reply("null").unwrap(), None);
        assert_eq!(parse_invoice_reply("  ").unwrap(), None);
        assert!(matches!(
            parse_invoice_reply("not json"),
            Err(ExtractionError::Response(_))
        ));
    }
}
