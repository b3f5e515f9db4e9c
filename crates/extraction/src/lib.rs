//! Document and grade extraction.
//!
//! Turns an uploaded grade report (a PDF, a ZIP of PDFs, or an Excel
//! workbook) into per-student [`StudentGrades`]. PDFs go through an
//! [`OcrEngine`] (Google Document AI in production); workbooks are read
//! directly with `calamine`.
//!
//! [`StudentGrades`]: scholarship_core::grades::StudentGrades

pub mod archive;
pub mod document_ai;
pub mod error;
pub mod processor;
pub mod spreadsheet;

pub use document_ai::{DisabledOcr, DocumentAiClient, DocumentAiConfig, OcrEngine};
pub use error::{DocumentAiError, ExtractionError};
pub use processor::{ExtractionOutput, Processor, ProgressSink};
