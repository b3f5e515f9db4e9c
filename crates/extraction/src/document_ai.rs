//! Google Document AI OCR client.
//!
//! Calls the synchronous `:process` REST method with the PDF inlined as
//! base64 and returns the recognized full text. The [`OcrEngine`] trait is
//! the seam the processor depends on, so tests can substitute canned text.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use crate::error::DocumentAiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_ENDPOINT: &str = "https://us-documentai.googleapis.com";

/// Turns a single PDF into plain text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract_text(&self, pdf: &[u8]) -> Result<String, DocumentAiError>;
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DocumentAiConfig {
    /// Regional API root, e.g. `https://us-documentai.googleapis.com`.
    pub endpoint: String,
    /// Full processor resource name,
    /// `projects/{project}/locations/{location}/processors/{id}`.
    pub processor: String,
    /// OAuth bearer token.
    pub token: String,
}

impl DocumentAiConfig {
    /// Load from the environment; `None` when the processor or token is
    /// missing.
    ///
    /// | Variable                | Default                                 |
    /// |-------------------------|-----------------------------------------|
    /// | `DOCUMENT_AI_ENDPOINT`  | `https://us-documentai.googleapis.com`  |
    /// | `DOCUMENT_AI_PROCESSOR` | required                                |
    /// | `DOCUMENT_AI_TOKEN`     | required                                |
    pub fn from_env() -> Option<Self> {
        let processor = std::env::var("DOCUMENT_AI_PROCESSOR").ok().filter(|p| !p.is_empty())?;
        let token = std::env::var("DOCUMENT_AI_TOKEN").ok().filter(|t| !t.is_empty())?;
        Some(Self {
            endpoint: std::env::var("DOCUMENT_AI_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            processor,
            token,
        })
    }

    pub fn process_url(&self) -> String {
        format!(
            "{}/v1/{}:process",
            self.endpoint.trim_end_matches('/'),
            self.processor.trim_matches('/')
        )
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one Document AI processor.
pub struct DocumentAiClient {
    client: reqwest::Client,
    config: DocumentAiConfig,
}

impl DocumentAiClient {
    pub fn new(config: DocumentAiConfig) -> Result<Self, DocumentAiError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OcrEngine for DocumentAiClient {
    fn name(&self) -> &'static str {
        "document_ai"
    }

    async fn extract_text(&self, pdf: &[u8]) -> Result<String, DocumentAiError> {
        let response = self
            .client
            .post(self.config.process_url())
            .bearer_auth(&self.config.token)
            .json(&request_body(pdf))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Document AI request rejected");
            return Err(DocumentAiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        let text = document_text(&value)?;
        tracing::debug!(bytes = pdf.len(), chars = text.len(), "Document AI OCR complete");
        Ok(text)
    }
}

/// Engine used when Document AI is not configured. Every PDF fails
/// permanently so the job reports the missing configuration.
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn extract_text(&self, _pdf: &[u8]) -> Result<String, DocumentAiError> {
        Err(DocumentAiError::Config(
            "set DOCUMENT_AI_PROCESSOR and DOCUMENT_AI_TOKEN to extract PDFs".to_string(),
        ))
    }
}

fn request_body(pdf: &[u8]) -> Value {
    json!({
        "skipHumanReview": true,
        "rawDocument": {
            "content": general_purpose::STANDARD.encode(pdf),
            "mimeType": "application/pdf",
        }
    })
}

fn document_text(value: &Value) -> Result<String, DocumentAiError> {
    value["document"]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DocumentAiError::Decode("missing document.text".to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config(endpoint: &str) -> DocumentAiConfig {
        DocumentAiConfig {
            endpoint: endpoint.to_string(),
            processor: "projects/demo/locations/us/processors/abc123".to_string(),
            token: "token".to_string(),
        }
    }

    #[test]
    fn process_url_joins_endpoint_and_processor() {
        assert_eq!(
            config("https://us-documentai.googleapis.com/").process_url(),
            "https://us-documentai.googleapis.com/v1/projects/demo/locations/us/processors/abc123:process"
        );
    }

    #[test]
    fn request_inlines_base64_pdf() {
        let body = request_body(b"%PDF");
        assert_eq!(body["rawDocument"]["content"], "JVBERg==");
        assert_eq!(body["rawDocument"]["mimeType"], "application/pdf");
    }

    #[test]
    fn reads_document_text() {
        let value = json!({ "document": { "text": "CS101 3 1.25\n", "pages": [] } });
        assert_eq!(document_text(&value).unwrap(), "CS101 3 1.25\n");
    }

    #[test]
    fn missing_text_is_a_decode_error() {
        assert_matches!(
            document_text(&json!({ "document": {} })),
            Err(DocumentAiError::Decode(_))
        );
    }

    #[tokio::test]
    async fn disabled_engine_fails_permanently() {
        let err = DisabledOcr.extract_text(b"%PDF").await.unwrap_err();
        assert_matches!(err, DocumentAiError::Config(_));
        assert!(!err.is_transient());
    }

    #[test]
    fn client_builds() {
        let client = DocumentAiClient::new(config(DEFAULT_ENDPOINT)).unwrap();
        assert_eq!(client.name(), "document_ai");
    }
}
