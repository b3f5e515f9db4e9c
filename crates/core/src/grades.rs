//! Grade parsing and GWA computation.
//!
//! Grades follow the Philippine 1.00 to 5.00 scale where lower is better,
//! 3.00 is the lowest passing grade, and letter marks (`INC`, `DRP`, `F`)
//! count as failing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::criteria::{Criterion, CriterionState};
use crate::derivation::gpa_state;
use crate::patch::ValidationPatch;

/// Highest numeric grade that still passes.
pub const PASSING_GRADE_MAX: f64 = 3.0;

static SUBJECT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*([A-Z]{2,6}\s?-?\d{2,4}[A-Z]?)\s+(?:(.+?)\s+)?(\d{1,2}(?:\.\d)?)\s+(\d\.\d{1,2}|INC|DRP|F)\s*$",
    )
    .expect("valid regex")
});

static STUDENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)student\s*(?:no\.?|number|id)\s*[:#]?\s*(\d{2,4}-\d{3,6}|\d{6,12})")
        .expect("valid regex")
});

static STUDENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(?:student\s+)?name\s*:\s*(.+?)\s*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Marks
// ---------------------------------------------------------------------------

/// A single grade mark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeMark {
    Numeric(f64),
    Failed,
    Incomplete,
    Dropped,
}

impl GradeMark {
    pub fn is_failing(self) -> bool {
        match self {
            Self::Numeric(g) => g > PASSING_GRADE_MAX,
            Self::Failed | Self::Incomplete | Self::Dropped => true,
        }
    }

    pub fn numeric(self) -> Option<f64> {
        match self {
            Self::Numeric(g) => Some(g),
            _ => None,
        }
    }
}

/// Parse a raw grade cell such as `"1.75"`, `"INC"`, or `"F"`.
pub fn parse_mark(raw: &str) -> Option<GradeMark> {
    let s = raw.trim();
    match s.to_ascii_uppercase().as_str() {
        "INC" | "INCOMPLETE" => return Some(GradeMark::Incomplete),
        "DRP" | "DROPPED" | "W" => return Some(GradeMark::Dropped),
        "F" | "FAILED" => return Some(GradeMark::Failed),
        _ => {}
    }
    let value: f64 = s.parse().ok()?;
    (1.0..=5.0).contains(&value).then_some(GradeMark::Numeric(value))
}

// ---------------------------------------------------------------------------
// Subjects and students
// ---------------------------------------------------------------------------

/// One subject row of a grade report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectGrade {
    pub code: String,
    pub description: Option<String>,
    pub units: f64,
    pub grade: String,
    pub numeric_grade: Option<f64>,
    pub failing: bool,
}

impl SubjectGrade {
    pub fn new(
        code: impl Into<String>,
        description: Option<String>,
        units: f64,
        raw_grade: &str,
    ) -> Result<Self, String> {
        let mark = parse_mark(raw_grade).ok_or_else(|| format!("Unrecognized grade '{raw_grade}'"))?;
        if !(units.is_finite() && units >= 0.0) {
            return Err(format!("Invalid units '{units}'"));
        }
        Ok(Self {
            code: code.into(),
            description,
            units,
            grade: raw_grade.trim().to_ascii_uppercase(),
            numeric_grade: mark.numeric(),
            failing: mark.is_failing(),
        })
    }
}

/// GWA over numeric grades, weighted by units and rounded to 2 decimals.
pub fn compute_gwa(subjects: &[SubjectGrade]) -> Option<f64> {
    let (weighted, units) = subjects
        .iter()
        .filter(|s| s.units > 0.0)
        .filter_map(|s| s.numeric_grade.map(|g| (g * s.units, s.units)))
        .fold((0.0, 0.0), |(w, u), (gw, gu)| (w + gw, u + gu));
    if units <= 0.0 {
        return None;
    }
    Some((weighted / units * 100.0).round() / 100.0)
}

/// Extracted grades for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentGrades {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub subjects: Vec<SubjectGrade>,
    pub total_units: f64,
    pub gwa: Option<f64>,
    pub has_failing_grade: bool,
}

impl StudentGrades {
    pub fn summarize(
        student_id: Option<String>,
        student_name: Option<String>,
        subjects: Vec<SubjectGrade>,
    ) -> Self {
        let total_units = subjects.iter().map(|s| s.units).sum();
        let gwa = compute_gwa(&subjects);
        let has_failing_grade = subjects.iter().any(|s| s.failing);
        Self {
            student_id,
            student_name,
            subjects,
            total_units,
            gwa,
            has_failing_grade,
        }
    }

    /// Registrar patch carrying the GWA and failing-grade outcome.
    pub fn to_patch(&self) -> ValidationPatch {
        let failing_state = if self.has_failing_grade {
            CriterionState::Failed
        } else {
            CriterionState::Passed
        };
        ValidationPatch {
            criteria: vec![
                (Criterion::Gpa, gpa_state(self.gwa)),
                (Criterion::NoFailingGrade, failing_state),
            ],
            gpa: Some(self.gwa),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Text parsing
// ---------------------------------------------------------------------------

/// Parse subject rows out of OCR text. Lines that do not look like a
/// subject row are skipped.
pub fn parse_grade_lines(text: &str) -> Vec<SubjectGrade> {
    text.lines()
        .filter_map(|line| {
            let caps = SUBJECT_LINE_RE.captures(line)?;
            let units: f64 = caps[3].parse().ok()?;
            let description = caps.get(2).map(|m| m.as_str().trim().to_string());
            SubjectGrade::new(caps[1].to_ascii_uppercase(), description, units, &caps[4]).ok()
        })
        .collect()
}

/// Parse one student's grade report from OCR text.
pub fn parse_transcript(text: &str) -> StudentGrades {
    let student_id = STUDENT_ID_RE.captures(text).map(|c| c[1].to_string());
    let student_name = STUDENT_NAME_RE.captures(text).map(|c| c[1].to_string());
    StudentGrades::summarize(student_id, student_name, parse_grade_lines(text))
}

/// Group `(student_id, subject)` rows into per-student summaries, keeping
/// first-seen order.
pub fn group_by_student<I>(rows: I) -> Vec<StudentGrades>
where
    I: IntoIterator<Item = (String, SubjectGrade)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut grouped: std::collections::HashMap<String, Vec<SubjectGrade>> =
        std::collections::HashMap::new();
    for (student_id, subject) in rows {
        if !grouped.contains_key(&student_id) {
            order.push(student_id.clone());
        }
        grouped.entry(student_id).or_default().push(subject);
    }
    order
        .into_iter()
        .map(|id| {
            let subjects = grouped.remove(&id).unwrap_or_default();
            StudentGrades::summarize(Some(id), None, subjects)
        })
        .collect()
}
