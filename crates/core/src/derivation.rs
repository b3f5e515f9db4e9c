//! Scholarship status derivation.
//!
//! Maps a renewal's criterion states to its overall status, the delisting
//! root-cause text, and the delisting date. Everything here is pure and is
//! re-run on every validation edit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::criteria::{CriteriaSet, CriterionState};
use crate::error::CoreError;
use crate::types::Timestamp;

/// Upper bound (inclusive) for a passing GPA. Lower is better.
pub const GPA_PASSING_MAX: f64 = 2.0;

/// Prefix of the delisting root-cause text.
pub const ROOT_CAUSE_PREFIX: &str = "Failed in: ";

/// Overall scholarship status of one renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScholarshipStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    Passed,
    Delisted,
}

impl ScholarshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Passed => "Passed",
            Self::Delisted => "Delisted",
        }
    }
}

impl FromStr for ScholarshipStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Started" => Ok(Self::NotStarted),
            "Passed" => Ok(Self::Passed),
            "Delisted" => Ok(Self::Delisted),
            other => Err(CoreError::Validation(format!(
                "Invalid scholarship status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ScholarshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status from criterion states alone.
///
/// Any `Failed` criterion delists, even when others are still `Not Started`.
pub fn derive_status(criteria: &CriteriaSet) -> ScholarshipStatus {
    let mut all_passed = true;
    for (_, state) in criteria.iter() {
        match state {
            CriterionState::Failed => return ScholarshipStatus::Delisted,
            CriterionState::NotStarted => all_passed = false,
            CriterionState::Passed => {}
        }
    }
    if all_passed {
        ScholarshipStatus::Passed
    } else {
        ScholarshipStatus::NotStarted
    }
}

/// `"Failed in: A, B"` over the failed criteria, or `None` when nothing failed.
pub fn delisting_root_cause(criteria: &CriteriaSet) -> Option<String> {
    let failed = criteria.failed();
    if failed.is_empty() {
        return None;
    }
    let labels: Vec<&str> = failed.iter().map(|c| c.label()).collect();
    Some(format!("{ROOT_CAUSE_PREFIX}{}", labels.join(", ")))
}

/// GPA criterion state from a raw GPA.
///
/// Absent and non-positive values mean the grade has not been recorded yet.
pub fn gpa_state(gpa: Option<f64>) -> CriterionState {
    match gpa {
        Some(g) if g.is_finite() && g > 0.0 && g <= GPA_PASSING_MAX => CriterionState::Passed,
        Some(g) if g.is_finite() && g > GPA_PASSING_MAX => CriterionState::Failed,
        _ => CriterionState::NotStarted,
    }
}

/// Result of deriving a validation row.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub status: ScholarshipStatus,
    pub root_cause: Option<String>,
    pub delisted_date: Option<Timestamp>,
}

impl Derivation {
    pub fn is_delisted(&self) -> bool {
        self.status == ScholarshipStatus::Delisted
    }
}

/// Derive status, root cause, and delisting date.
///
/// `previous_delisted_date` is kept when the row was already delisted, so
/// re-deriving an unchanged record does not move its date.
pub fn derive(
    criteria: &CriteriaSet,
    previous_delisted_date: Option<Timestamp>,
    now: Timestamp,
) -> Derivation {
    let status = derive_status(criteria);
    if status != ScholarshipStatus::Delisted {
        return Derivation {
            status,
            root_cause: None,
            delisted_date: None,
        };
    }
    Derivation {
        status,
        root_cause: delisting_root_cause(criteria),
        delisted_date: Some(previous_delisted_date.unwrap_or(now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criterion;
    use chrono::{TimeZone, Utc};

    fn ts(day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn all_passed_is_passed_with_empty_cause() {
        let set = CriteriaSet::uniform(CriterionState::Passed);
        let d = derive(&set, None, ts(1));
        assert_eq!(d.status, ScholarshipStatus::Passed);
        assert_eq!(d.root_cause, None);
        assert_eq!(d.delisted_date, None);
    }

    #[test]
    fn single_failure_delists_with_label() {
        let set = CriteriaSet::uniform(CriterionState::Passed)
            .with(Criterion::NoFailingGrade, CriterionState::Failed);
        let d = derive(&set, None, ts(1));
        assert_eq!(d.status, ScholarshipStatus::Delisted);
        assert_eq!(d.root_cause.as_deref(), Some("Failed in: No Failing Grades"));
        assert_eq!(d.delisted_date, Some(ts(1)));
    }

    #[test]
    fn root_cause_lists_exactly_the_failed_criteria() {
        let set = CriteriaSet::uniform(CriterionState::Passed)
            .with(Criterion::Enrollment, CriterionState::Failed)
            .with(Criterion::GoodMoral, CriterionState::Failed);
        assert_eq!(
            delisting_root_cause(&set).as_deref(),
            Some("Failed in: Good Moral, Enrollment")
        );
    }

    #[test]
    fn every_single_failure_delists() {
        for criterion in Criterion::ALL {
            let set = CriteriaSet::uniform(CriterionState::Passed)
                .with(criterion, CriterionState::Failed);
            assert_eq!(derive_status(&set), ScholarshipStatus::Delisted);
            assert_eq!(
                delisting_root_cause(&set),
                Some(format!("Failed in: {}", criterion.label()))
            );
        }
    }

    #[test]
    fn not_started_without_failure_is_not_started() {
        let set = CriteriaSet::uniform(CriterionState::Passed)
            .with(Criterion::FullLoad, CriterionState::NotStarted);
        assert_eq!(derive_status(&set), ScholarshipStatus::NotStarted);
        assert_eq!(derive_status(&CriteriaSet::default()), ScholarshipStatus::NotStarted);
    }

    #[test]
    fn failure_wins_over_not_started() {
        let set = CriteriaSet::default().with(Criterion::Gpa, CriterionState::Failed);
        assert_eq!(derive_status(&set), ScholarshipStatus::Delisted);
    }

    #[test]
    fn gpa_thresholds() {
        assert_eq!(gpa_state(Some(1.0)), CriterionState::Passed);
        assert_eq!(gpa_state(Some(2.0)), CriterionState::Passed);
        assert_eq!(gpa_state(Some(2.01)), CriterionState::Failed);
        assert_eq!(gpa_state(Some(3.5)), CriterionState::Failed);
        assert_eq!(gpa_state(None), CriterionState::NotStarted);
        assert_eq!(gpa_state(Some(0.0)), CriterionState::NotStarted);
        assert_eq!(gpa_state(Some(-1.0)), CriterionState::NotStarted);
        assert_eq!(gpa_state(Some(f64::NAN)), CriterionState::NotStarted);
    }

    #[test]
    fn rederiving_is_idempotent_and_keeps_date() {
        let set = CriteriaSet::uniform(CriterionState::Passed)
            .with(Criterion::Gpa, CriterionState::Failed);
        let first = derive(&set, None, ts(1));
        let second = derive(&set, first.delisted_date, ts(9));
        assert_eq!(first, second);
    }

    #[test]
    fn leaving_delisted_clears_date() {
        let set = CriteriaSet::uniform(CriterionState::Passed);
        let d = derive(&set, Some(ts(1)), ts(2));
        assert_eq!(d.delisted_date, None);
        assert!(!d.is_delisted());
    }

    #[test]
    fn status_parses_database_text() {
        assert_eq!(
            "Not Started".parse::<ScholarshipStatus>().unwrap(),
            ScholarshipStatus::NotStarted
        );
        assert!("Active".parse::<ScholarshipStatus>().is_err());
    }
}
