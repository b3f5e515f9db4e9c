//! Disbursement schedule validation and amount helpers.
//!
//! Amounts are stored as integer centavos to avoid float drift in totals.

use chrono::NaiveDate;

use crate::error::CoreError;

/// Largest stipend per scholar (PHP 1,000,000.00).
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// Convert a peso amount from a request body to centavos.
pub fn amount_to_cents(amount: f64) -> Result<i64, CoreError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::Validation(
            "Amount must be a positive number".into(),
        ));
    }
    let cents = (amount * 100.0).round() as i64;
    if cents > MAX_AMOUNT_CENTS {
        return Err(CoreError::Validation(format!(
            "Amount exceeds the maximum of {}",
            format_cents(MAX_AMOUNT_CENTS)
        )));
    }
    Ok(cents)
}

/// A schedule's release date may not be in the past.
pub fn validate_release_date(release_date: NaiveDate, today: NaiveDate) -> Result<(), CoreError> {
    if release_date < today {
        return Err(CoreError::Validation(format!(
            "Release date {release_date} is in the past"
        )));
    }
    Ok(())
}

/// Total for `count` scholars at `per_scholar_cents` each.
pub fn total_cents(per_scholar_cents: i64, count: i64) -> i64 {
    per_scholar_cents.saturating_mul(count)
}

/// Render centavos as `PHP 1,234.50`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}PHP {grouped}.{:02}", abs % 100)
}
