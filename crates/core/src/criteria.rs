//! Renewal validation criteria and their per-criterion states.
//!
//! Each renewal carries eight independent criteria. The column names here
//! must match the `validations` table and the `vw_renewal_details` view.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// CriterionState
// ---------------------------------------------------------------------------

pub const STATE_NOT_STARTED: &str = "Not Started";
pub const STATE_PASSED: &str = "Passed";
pub const STATE_FAILED: &str = "Failed";

/// State of a single validation criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CriterionState {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    Passed,
    Failed,
}

impl CriterionState {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => STATE_NOT_STARTED,
            Self::Passed => STATE_PASSED,
            Self::Failed => STATE_FAILED,
        }
    }
}

impl FromStr for CriterionState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATE_NOT_STARTED => Ok(Self::NotStarted),
            STATE_PASSED => Ok(Self::Passed),
            STATE_FAILED => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid criterion state '{other}'. Must be one of: \
                 {STATE_NOT_STARTED}, {STATE_PASSED}, {STATE_FAILED}"
            ))),
        }
    }
}

impl fmt::Display for CriterionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Criterion
// ---------------------------------------------------------------------------

/// One of the eight renewal criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Gpa,
    NoFailingGrade,
    NoOtherScholarship,
    GoodMoral,
    NoDerogatoryRecord,
    FullLoad,
    WithdrawalChange,
    Enrollment,
}

impl Criterion {
    /// All criteria in display order. Root-cause text follows this order.
    pub const ALL: [Criterion; 8] = [
        Criterion::Gpa,
        Criterion::NoFailingGrade,
        Criterion::NoOtherScholarship,
        Criterion::GoodMoral,
        Criterion::NoDerogatoryRecord,
        Criterion::FullLoad,
        Criterion::WithdrawalChange,
        Criterion::Enrollment,
    ];

    /// Column name in the `validations` table.
    pub fn column(self) -> &'static str {
        match self {
            Self::Gpa => "gpa_validation",
            Self::NoFailingGrade => "no_failing_grade_validation",
            Self::NoOtherScholarship => "no_other_scholarship_validation",
            Self::GoodMoral => "good_moral_validation",
            Self::NoDerogatoryRecord => "no_derogatory_record_validation",
            Self::FullLoad => "full_load_validation",
            Self::WithdrawalChange => "withdrawal_change_validation",
            Self::Enrollment => "enrollment_validation",
        }
    }

    /// Display name used in delisting root-cause text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Gpa => "GPA",
            Self::NoFailingGrade => "No Failing Grades",
            Self::NoOtherScholarship => "No Other Scholarship",
            Self::GoodMoral => "Good Moral",
            Self::NoDerogatoryRecord => "No Derogatory Record",
            Self::FullLoad => "Full Load",
            Self::WithdrawalChange => "No Withdrawal/Change of Course",
            Self::Enrollment => "Enrollment",
        }
    }

    /// Resolve a column name back to its criterion.
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.column() == column)
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// CriteriaSet
// ---------------------------------------------------------------------------

/// The full set of criterion states for one renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CriteriaSet {
    states: [CriterionState; 8],
}

impl CriteriaSet {
    /// Every criterion in the same state.
    pub fn uniform(state: CriterionState) -> Self {
        Self { states: [state; 8] }
    }

    pub fn get(&self, criterion: Criterion) -> CriterionState {
        self.states[criterion.index()]
    }

    pub fn set(&mut self, criterion: Criterion, state: CriterionState) {
        self.states[criterion.index()] = state;
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, criterion: Criterion, state: CriterionState) -> Self {
        self.set(criterion, state);
        self
    }

    /// Iterate `(criterion, state)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, CriterionState)> + '_ {
        Criterion::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    /// Criteria currently in the `Failed` state, in display order.
    pub fn failed(&self) -> Vec<Criterion> {
        self.iter()
            .filter(|(_, s)| *s == CriterionState::Failed)
            .map(|(c, _)| c)
            .collect()
    }

    /// Build from column-name/state-string pairs as read from the database.
    ///
    /// Unknown columns are rejected; missing columns stay `Not Started`.
    pub fn from_columns<'a, I>(pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::default();
        for (column, value) in pairs {
            let criterion = Criterion::from_column(column).ok_or_else(|| {
                CoreError::Validation(format!("Unknown criterion column '{column}'"))
            })?;
            set.set(criterion, value.parse()?);
        }
        Ok(set)
    }
}
