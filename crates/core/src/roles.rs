//! Well-known role name constants.
//!
//! These must match the seed data in `20260301000001_create_reference_tables.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_REGISTRAR: &str = "registrar";
pub const ROLE_DISCIPLINE_OFFICE: &str = "discipline_office";
pub const ROLE_HR: &str = "hr";
pub const ROLE_SCHOLARSHIP_OFFICER: &str = "scholarship_officer";

/// Every seeded role.
pub const ALL_ROLES: &[&str] = &[
    ROLE_ADMIN,
    ROLE_REGISTRAR,
    ROLE_DISCIPLINE_OFFICE,
    ROLE_HR,
    ROLE_SCHOLARSHIP_OFFICER,
];

/// Roles that receive one validator row per renewal at cycle initialization.
pub const VALIDATOR_ROLES: &[&str] = &[ROLE_REGISTRAR, ROLE_DISCIPLINE_OFFICE, ROLE_HR];

/// Roles allowed to patch renewals without going through a validator row.
pub const BLANKET_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_SCHOLARSHIP_OFFICER];

pub fn is_known_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}

/// Whether `role` may edit renewals without a validator assignment.
pub fn is_blanket_role(role: &str) -> bool {
    BLANKET_ROLES.contains(&role)
}

/// Whether `role` is one of the per-renewal validator roles.
pub fn is_validator_role(role: &str) -> bool {
    VALIDATOR_ROLES.contains(&role)
}

/// Human-readable label used in notifications and reports.
pub fn role_label(role: &str) -> &str {
    match role {
        ROLE_ADMIN => "Administrator",
        ROLE_REGISTRAR => "Registrar",
        ROLE_DISCIPLINE_OFFICE => "Discipline Office",
        ROLE_HR => "HR",
        ROLE_SCHOLARSHIP_OFFICER => "Scholarship Officer",
        other => other,
    }
}
