//! Renewal cycle terms and basis-term planning.
//!
//! A renewal targets one (school year, semester). Eligibility is judged on
//! the *basis* term: the term immediately before the target.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const FIRST_SEMESTER: &str = "1st Semester";
pub const SECOND_SEMESTER: &str = "2nd Semester";

static SCHOOL_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{4})$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semester {
    #[serde(rename = "1st Semester")]
    First,
    #[serde(rename = "2nd Semester")]
    Second,
}

impl Semester {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => FIRST_SEMESTER,
            Self::Second => SECOND_SEMESTER,
        }
    }
}

impl FromStr for Semester {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FIRST_SEMESTER => Ok(Self::First),
            SECOND_SEMESTER => Ok(Self::Second),
            other => Err(CoreError::Validation(format!(
                "Invalid semester '{other}'. Must be '{FIRST_SEMESTER}' or '{SECOND_SEMESTER}'"
            ))),
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Academic year written as `"2024-2025"`. Stores the starting year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchoolYear(i32);

impl SchoolYear {
    pub fn new(start: i32) -> Self {
        Self(start)
    }

    pub fn start(self) -> i32 {
        self.0
    }

    pub fn previous(self) -> Self {
        Self(self.0 - 1)
    }
}

impl FromStr for SchoolYear {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid school year '{s}'. Expected YYYY-YYYY"));
        let caps = SCHOOL_YEAR_RE.captures(s).ok_or_else(invalid)?;
        let start: i32 = caps[1].parse().map_err(|_| invalid())?;
        let end: i32 = caps[2].parse().map_err(|_| invalid())?;
        if end != start + 1 {
            return Err(CoreError::Validation(format!(
                "School year '{s}' must span consecutive years"
            )));
        }
        Ok(Self(start))
    }
}

impl fmt::Display for SchoolYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.0 + 1)
    }
}

/// One academic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    pub school_year: SchoolYear,
    pub semester: Semester,
}

impl Term {
    pub fn parse(school_year: &str, semester: &str) -> Result<Self, CoreError> {
        Ok(Self {
            school_year: school_year.parse()?,
            semester: semester.parse()?,
        })
    }

    /// The term immediately before this one.
    pub fn previous(self) -> Self {
        match self.semester {
            Semester::Second => Self {
                school_year: self.school_year,
                semester: Semester::First,
            },
            Semester::First => Self {
                school_year: self.school_year.previous(),
                semester: Semester::Second,
            },
        }
    }
}

/// Target and basis fields for one scholar's renewal row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalPlan {
    pub year_level: i16,
    pub semester: Semester,
    pub school_year: SchoolYear,
    pub year_level_basis: i16,
    pub semester_basis: Semester,
    pub school_year_basis: SchoolYear,
}

/// Plan a renewal for a scholar currently at `year_level`.
///
/// Crossing into a new school year means the basis term was spent one
/// year level lower (never below 1).
pub fn plan_renewal(target: Term, year_level: i16) -> RenewalPlan {
    let basis = target.previous();
    let year_level_basis = if basis.school_year != target.school_year {
        (year_level - 1).max(1)
    } else {
        year_level
    };
    RenewalPlan {
        year_level,
        semester: target.semester,
        school_year: target.school_year,
        year_level_basis,
        semester_basis: basis.semester,
        school_year_basis: basis.school_year,
    }
}
