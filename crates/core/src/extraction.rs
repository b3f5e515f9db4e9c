//! Extraction upload kinds and retry backoff.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

pub const KIND_PDF: &str = "pdf";
pub const KIND_ZIP: &str = "zip";
pub const KIND_EXCEL: &str = "excel";

/// Largest accepted upload (25 MiB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Supported upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Zip,
    Excel,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => KIND_PDF,
            Self::Zip => KIND_ZIP,
            Self::Excel => KIND_EXCEL,
        }
    }

    /// Parse the value stored in `extraction_jobs.file_kind`.
    pub fn from_db(value: &str) -> Result<Self, CoreError> {
        match value {
            KIND_PDF => Ok(Self::Pdf),
            KIND_ZIP => Ok(Self::Zip),
            KIND_EXCEL => Ok(Self::Excel),
            other => Err(CoreError::Validation(format!("Unknown file kind '{other}'"))),
        }
    }

    /// Detect the kind from the file name, falling back to the content type.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Result<Self, CoreError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => return Ok(Self::Pdf),
            "zip" => return Ok(Self::Zip),
            "xlsx" | "xls" | "xlsm" => return Ok(Self::Excel),
            _ => {}
        }
        match content_type {
            Some("application/pdf") => Ok(Self::Pdf),
            Some("application/zip" | "application/x-zip-compressed") => Ok(Self::Zip),
            Some(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.ms-excel",
            ) => Ok(Self::Excel),
            _ => Err(CoreError::Validation(format!(
                "Unsupported file '{filename}'. Upload a PDF, ZIP, or Excel workbook"
            ))),
        }
    }

    /// Content type used when storing the original.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff for transient extraction failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (1-based) failed.
    ///
    /// Doubles per attempt and is clamped to `max_delay`.
    pub fn delay_for(&self, attempt: i32) -> Duration {
        let exp = attempt.saturating_sub(1).clamp(0, 20) as u32;
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts` have run.
    pub fn can_retry(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }
}

/// Object key for an uploaded original.
pub fn object_key(job_id: &str, filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("extractions/{job_id}/{safe}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(FileKind::detect("grades.PDF", None).unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::detect("batch.zip", None).unwrap(), FileKind::Zip);
        assert_eq!(FileKind::detect("list.xlsx", None).unwrap(), FileKind::Excel);
    }

    #[test]
    fn falls_back_to_content_type() {
        assert_eq!(
            FileKind::detect("upload", Some("application/pdf")).unwrap(),
            FileKind::Pdf
        );
        assert!(FileKind::detect("notes.txt", Some("text/plain")).is_err());
    }

    #[test]
    fn kind_round_trips_through_db_value() {
        for kind in [FileKind::Pdf, FileKind::Zip, FileKind::Excel] {
            assert_eq!(FileKind::from_db(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(50), Duration::from_secs(10));
    }

    #[test]
    fn retry_respects_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.can_retry(2));
        assert!(!policy.can_retry(3));
    }

    #[test]
    fn object_key_sanitizes_name() {
        assert_eq!(
            object_key("abc", "my grades (1).pdf"),
            "extractions/abc/my_grades__1_.pdf"
        );
    }
}
