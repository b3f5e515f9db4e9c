//! Extraction job engine.
//!
//! [`runner::ExtractionRunner`] claims pending extraction jobs from the
//! PostgreSQL queue and runs them through the OCR/grade processor with
//! bounded concurrency. [`progress`] turns processor progress into job row
//! updates and WebSocket pushes.

pub mod progress;
pub mod runner;

pub use runner::ExtractionRunner;
