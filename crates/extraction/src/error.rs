//! Extraction error types.
//!
//! [`ExtractionError::is_transient`] drives the job runner's retry policy:
//! transient failures are retried with backoff, everything else fails the
//! job immediately.

/// Errors from the Document AI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum DocumentAiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Document AI request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Document AI returned a non-2xx status code.
    #[error("Document AI error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected Document AI response: {0}")]
    Decode(String),

    #[error("Document AI is not configured: {0}")]
    Config(String),
}

impl DocumentAiError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Config(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unsupported upload: {0}")]
    Unsupported(String),

    #[error("Invalid ZIP archive: {0}")]
    Archive(String),

    #[error("Invalid workbook: {0}")]
    Spreadsheet(String),

    /// The document was read but no grades could be recognized.
    #[error("Could not parse grades: {0}")]
    Parse(String),

    #[error(transparent)]
    Ocr(#[from] DocumentAiError),
}

impl ExtractionError {
    /// Whether retrying the same input may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Ocr(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

impl From<calamine::Error> for ExtractionError {
    fn from(e: calamine::Error) -> Self {
        Self::Spreadsheet(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ExtractionError {
        ExtractionError::Ocr(DocumentAiError::Status {
            status: code,
            body: String::new(),
        })
    }

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        assert!(!status(403).is_transient());
        assert!(!ExtractionError::Ocr(DocumentAiError::Decode("no text".into())).is_transient());
    }

    #[test]
    fn input_errors_are_permanent() {
        assert!(!ExtractionError::Unsupported("notes.txt".into()).is_transient());
        assert!(!ExtractionError::Archive("bad header".into()).is_transient());
        assert!(!ExtractionError::Parse("no rows".into()).is_transient());
    }

    #[test]
    fn transport_errors_are_transient() {
        let err = reqwest::Client::new().get("://bad").build().unwrap_err();
        assert!(ExtractionError::from(DocumentAiError::from(err)).is_transient());
    }
}
