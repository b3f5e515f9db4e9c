//! Validator responsibility rules.
//!
//! A responsibility row grants a role permission to edit one patch field.
//! The special field [`FIELD_ALL`] grants every field.

use crate::criteria::Criterion;
use crate::patch::{ValidationPatch, FIELD_GPA, FIELD_IS_VALIDATED, FIELD_RENEWAL_DATE};

/// Blanket permission marker stored in `validator_responsibilities.field_name`.
pub const FIELD_ALL: &str = "All";

/// Whether `field` may appear in a responsibility row.
pub fn is_assignable_field(field: &str) -> bool {
    field == FIELD_ALL
        || field == FIELD_GPA
        || field == FIELD_RENEWAL_DATE
        || Criterion::from_column(field).is_some()
}

/// Validate a full responsibility list for one role.
pub fn validate_fields(fields: &[String]) -> Result<(), String> {
    if let Some(bad) = fields.iter().find(|f| !is_assignable_field(f)) {
        return Err(format!("Unknown responsibility field '{bad}'"));
    }
    Ok(())
}

/// Drop every field the role is not responsible for. Returns dropped names.
///
/// `is_validated` is always kept: it is the validator's sign-off on its own
/// row, not a validation field.
pub fn filter_patch(patch: &mut ValidationPatch, permitted: &[String]) -> Vec<&'static str> {
    if permitted.iter().any(|f| f == FIELD_ALL) {
        return Vec::new();
    }
    patch.retain_fields(|field| field == FIELD_IS_VALIDATED || permitted.iter().any(|p| p == field))
}

/// Drop every field owned by a validator that has already signed off.
/// Returns dropped names.
///
/// `frozen` holds the responsibility fields of the signed-off roles; a
/// frozen [`FIELD_ALL`] freezes the whole patch.
pub fn drop_frozen_fields(patch: &mut ValidationPatch, frozen: &[String]) -> Vec<&'static str> {
    if frozen.iter().any(|f| f == FIELD_ALL) {
        return patch.retain_fields(|_| false);
    }
    patch.retain_fields(|field| !frozen.iter().any(|f| f == field))
}
