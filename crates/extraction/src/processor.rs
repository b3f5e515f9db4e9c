//! Upload-to-grades processing for one extraction job.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use scholarship_core::extraction::FileKind;
use scholarship_core::grades::{parse_transcript, StudentGrades};

use crate::archive;
use crate::document_ai::OcrEngine;
use crate::error::ExtractionError;
use crate::spreadsheet;

/// Receives progress updates while a job runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, percent: i16, message: &str);
}

/// Sink that drops every update.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _percent: i16, _message: &str) {}
}

/// Result payload stored on a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub students: Vec<StudentGrades>,
    /// PDFs or worksheets read.
    pub files_processed: usize,
    /// Entries or rows that were ignored, with the reason.
    pub skipped: Vec<String>,
}

/// Runs OCR and grade parsing for an uploaded file.
pub struct Processor {
    ocr: Arc<dyn OcrEngine>,
}

impl Processor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub async fn process(
        &self,
        kind: FileKind,
        filename: &str,
        bytes: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let output = match kind {
            FileKind::Pdf => self.process_pdf(filename, bytes, sink).await?,
            FileKind::Zip => self.process_zip(bytes, sink).await?,
            FileKind::Excel => {
                sink.report(20, "Reading workbook").await;
                let sheet = spreadsheet::read_workbook(bytes)?;
                ExtractionOutput {
                    students: sheet.students,
                    files_processed: 1,
                    skipped: sheet.skipped,
                }
            }
        };

        tracing::info!(
            kind = kind.as_str(),
            filename,
            ocr = self.ocr.name(),
            students = output.students.len(),
            skipped = output.skipped.len(),
            "Extraction processed"
        );
        sink.report(95, "Grades parsed").await;
        Ok(output)
    }

    async fn process_pdf(
        &self,
        filename: &str,
        bytes: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionOutput, ExtractionError> {
        sink.report(10, "Running OCR").await;
        let student = self.read_pdf(filename, bytes).await?;
        Ok(ExtractionOutput {
            students: vec![student],
            files_processed: 1,
            skipped: Vec::new(),
        })
    }

    async fn process_zip(
        &self,
        bytes: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionOutput, ExtractionError> {
        sink.report(5, "Opening archive").await;
        let contents = archive::read_pdfs(bytes)?;
        if contents.pdfs.is_empty() {
            return Err(ExtractionError::Unsupported(
                "archive contains no PDF files".to_string(),
            ));
        }

        let total = contents.pdfs.len();
        let mut output = ExtractionOutput {
            skipped: contents
                .skipped
                .into_iter()
                .map(|name| format!("{name}: not a PDF"))
                .collect(),
            ..Default::default()
        };

        for (index, entry) in contents.pdfs.iter().enumerate() {
            let percent = 10 + (80 * index / total) as i16;
            sink.report(percent, &format!("OCR {} of {total}: {}", index + 1, entry.name))
                .await;
            match self.read_pdf(&entry.name, &entry.bytes).await {
                Ok(student) => {
                    output.students.push(student);
                    output.files_processed += 1;
                }
                // One unreadable report should not sink the whole batch;
                // transient OCR failures still fail the attempt.
                Err(ExtractionError::Parse(reason)) => {
                    output.skipped.push(format!("{}: {reason}", entry.name));
                }
                Err(e) => return Err(e),
            }
        }

        if output.students.is_empty() {
            return Err(ExtractionError::Parse(
                "no grades recognized in any PDF of the archive".to_string(),
            ));
        }
        Ok(output)
    }

    async fn read_pdf(&self, name: &str, bytes: &[u8]) -> Result<StudentGrades, ExtractionError> {
        let text = self.ocr.extract_text(bytes).await?;
        let mut student = parse_transcript(&text);
        if student.subjects.is_empty() {
            return Err(ExtractionError::Parse("no subject rows recognized".to_string()));
        }
        if student.student_id.is_none() {
            student.student_id = student_id_from_filename(name);
        }
        Ok(student)
    }
}

/// Reports are often named after the student number (`2021-0001.pdf`).
fn student_id_from_filename(name: &str) -> Option<String> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);
    let looks_like_id = stem.len() >= 6
        && stem.chars().all(|c| c.is_ascii_digit() || c == '-')
        && stem.chars().any(|c| c.is_ascii_digit());
    looks_like_id.then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::archive::tests::build_zip;
    use crate::error::DocumentAiError;

    /// Returns canned text keyed by the PDF bytes.
    struct FakeOcr {
        texts: HashMap<Vec<u8>, String>,
        fail_with: Option<u16>,
    }

    impl FakeOcr {
        fn new(texts: &[(&[u8], &str)]) -> Self {
            Self {
                texts: texts
                    .iter()
                    .map(|(k, v)| (k.to_vec(), v.to_string()))
                    .collect(),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn extract_text(&self, pdf: &[u8]) -> Result<String, DocumentAiError> {
            if let Some(status) = self.fail_with {
                return Err(DocumentAiError::Status {
                    status,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.texts.get(pdf).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<i16>>);

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, percent: i16, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    const REPORT_A: &str = "Student No.: 2021-0001\nCS101 Programming 3 1.25\nMATH101 3 1.75\n";
    const REPORT_B: &str = "CS101 3 3.50\n";

    fn processor(ocr: FakeOcr) -> Processor {
        Processor::new(Arc::new(ocr))
    }

    #[tokio::test]
    async fn pdf_yields_one_student() {
        let p = processor(FakeOcr::new(&[(b"pdf-a", REPORT_A)]));
        let sink = RecordingSink::default();
        let out = p.process(FileKind::Pdf, "upload.pdf", b"pdf-a", &sink).await.unwrap();

        assert_eq!(out.files_processed, 1);
        assert_eq!(out.students[0].student_id.as_deref(), Some("2021-0001"));
        assert_eq!(out.students[0].gwa, Some(1.5));
        let progress = sink.0.lock().unwrap().clone();
        assert_eq!(progress.first(), Some(&10));
        assert_eq!(progress.last(), Some(&95));
    }

    #[tokio::test]
    async fn pdf_without_subject_rows_is_a_parse_error() {
        let p = processor(FakeOcr::new(&[(b"pdf-a", "nothing useful")]));
        assert_matches!(
            p.process(FileKind::Pdf, "a.pdf", b"pdf-a", &NoProgress).await,
            Err(ExtractionError::Parse(_))
        );
    }

    #[tokio::test]
    async fn zip_processes_each_pdf_and_names_students_from_files() {
        let zip = build_zip(&[
            ("a.pdf", b"pdf-a"),
            ("2021-0002.pdf", b"pdf-b"),
            ("blank.pdf", b"pdf-c"),
            ("notes.txt", b"hi"),
        ]);
        let p = processor(FakeOcr::new(&[(b"pdf-a", REPORT_A), (b"pdf-b", REPORT_B)]));
        let out = p.process(FileKind::Zip, "batch.zip", &zip, &NoProgress).await.unwrap();

        assert_eq!(out.files_processed, 2);
        assert_eq!(out.students.len(), 2);
        assert_eq!(out.students[1].student_id.as_deref(), Some("2021-0002"));
        assert!(out.students[1].has_failing_grade);
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.iter().any(|s| s.starts_with("notes.txt")));
        assert!(out.skipped.iter().any(|s| s.starts_with("blank.pdf")));
    }

    #[tokio::test]
    async fn zip_without_pdfs_is_unsupported() {
        let zip = build_zip(&[("notes.txt", b"hi")]);
        let p = processor(FakeOcr::new(&[]));
        assert_matches!(
            p.process(FileKind::Zip, "batch.zip", &zip, &NoProgress).await,
            Err(ExtractionError::Unsupported(_))
        );
    }

    #[tokio::test]
    async fn ocr_outage_is_transient() {
        let mut ocr = FakeOcr::new(&[]);
        ocr.fail_with = Some(503);
        let err = processor(ocr)
            .process(FileKind::Pdf, "a.pdf", b"pdf-a", &NoProgress)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn student_id_from_filename_requires_an_id_shape() {
        assert_eq!(
            student_id_from_filename("reports/2021-00123.pdf").as_deref(),
            Some("2021-00123")
        );
        assert_eq!(student_id_from_filename("grades.pdf"), None);
        assert_eq!(student_id_from_filename("12.pdf"), None);
    }
}
