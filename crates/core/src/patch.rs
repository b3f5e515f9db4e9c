//! Changed-field patches submitted to the renewal batch update.
//!
//! Clients send a flat JSON object of changed fields per renewal. This
//! module turns that object into a typed [`ValidationPatch`] and knows which
//! table each field belongs to.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::criteria::{CriteriaSet, Criterion, CriterionState};
use crate::derivation::gpa_state;
use crate::error::CoreError;

pub const FIELD_GPA: &str = "gpa";
pub const FIELD_RENEWAL_DATE: &str = "renewal_date";
pub const FIELD_IS_VALIDATED: &str = "is_validated";

/// Fields computed server-side. Clients often echo them back; they are
/// dropped silently rather than rejected.
pub const DERIVED_FIELDS: &[&str] = &["scholarship_status", "delisting_root_cause", "delisted_date"];

/// A typed set of changes for one renewal.
///
/// `gpa` is doubly optional: `Some(None)` clears the stored GPA.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationPatch {
    pub criteria: Vec<(Criterion, CriterionState)>,
    pub gpa: Option<Option<f64>>,
    pub renewal_date: Option<NaiveDate>,
    pub is_validated: Option<bool>,
}

impl ValidationPatch {
    /// Parse a `changed_fields` object.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, CoreError> {
        let mut patch = Self::default();
        for (name, value) in fields {
            if DERIVED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if let Some(criterion) = Criterion::from_column(name) {
                let state = value
                    .as_str()
                    .ok_or_else(|| {
                        CoreError::Validation(format!("Field '{name}' must be a string"))
                    })?
                    .parse::<CriterionState>()?;
                patch.criteria.push((criterion, state));
                continue;
            }
            match name.as_str() {
                FIELD_GPA => patch.gpa = Some(parse_gpa(value)?),
                FIELD_RENEWAL_DATE => patch.renewal_date = Some(parse_date(name, value)?),
                FIELD_IS_VALIDATED => {
                    let flag = value.as_bool().ok_or_else(|| {
                        CoreError::Validation(format!("Field '{name}' must be a boolean"))
                    })?;
                    patch.is_validated = Some(flag);
                }
                other => {
                    return Err(CoreError::Validation(format!(
                        "Unknown field '{other}' in changed fields"
                    )))
                }
            }
        }
        Ok(patch)
    }

    /// Names of the fields this patch sets.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.criteria.iter().map(|(c, _)| c.column()).collect();
        if self.gpa.is_some() {
            names.push(FIELD_GPA);
        }
        if self.renewal_date.is_some() {
            names.push(FIELD_RENEWAL_DATE);
        }
        if self.is_validated.is_some() {
            names.push(FIELD_IS_VALIDATED);
        }
        names
    }

    /// Keep only the fields for which `keep` returns true. Returns the
    /// names that were dropped.
    pub fn retain_fields<F>(&mut self, mut keep: F) -> Vec<&'static str>
    where
        F: FnMut(&str) -> bool,
    {
        let mut dropped = Vec::new();
        self.criteria.retain(|(c, _)| {
            let ok = keep(c.column());
            if !ok {
                dropped.push(c.column());
            }
            ok
        });
        if self.gpa.is_some() && !keep(FIELD_GPA) {
            self.gpa = None;
            dropped.push(FIELD_GPA);
        }
        if self.renewal_date.is_some() && !keep(FIELD_RENEWAL_DATE) {
            self.renewal_date = None;
            dropped.push(FIELD_RENEWAL_DATE);
        }
        if self.is_validated.is_some() && !keep(FIELD_IS_VALIDATED) {
            self.is_validated = None;
            dropped.push(FIELD_IS_VALIDATED);
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_validation() && self.renewal_date.is_none() && self.is_validated.is_none()
    }

    /// Whether the `validations` row needs rewriting.
    pub fn touches_validation(&self) -> bool {
        !self.criteria.is_empty() || self.gpa.is_some()
    }

    /// Apply the validation-table part of the patch to the current values.
    ///
    /// A GPA change without an explicit `gpa_validation` re-derives the GPA
    /// criterion from the new value.
    pub fn apply_to(&self, criteria: &mut CriteriaSet, gpa: &mut Option<f64>) {
        let explicit_gpa_state = self.criteria.iter().any(|(c, _)| *c == Criterion::Gpa);
        if let Some(new_gpa) = self.gpa {
            *gpa = new_gpa;
            if !explicit_gpa_state {
                criteria.set(Criterion::Gpa, gpa_state(new_gpa));
            }
        }
        for (criterion, state) in &self.criteria {
            criteria.set(*criterion, *state);
        }
    }
}

fn parse_gpa(value: &Value) -> Result<Option<f64>, CoreError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| CoreError::Validation("Field 'gpa' is not a valid number".into())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CoreError::Validation(format!("Field 'gpa' is not a number: '{s}'"))),
        _ => Err(CoreError::Validation("Field 'gpa' must be a number".into())),
    }
}

fn parse_date(name: &str, value: &Value) -> Result<NaiveDate, CoreError> {
    let raw = value
        .as_str()
        .ok_or_else(|| CoreError::Validation(format!("Field '{name}' must be a date string")))?;
    // Accept full timestamps by taking the date part.
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| CoreError::Validation(format!("Field '{name}' is not a YYYY-MM-DD date")))
}
