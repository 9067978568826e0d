use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::EngineError;

// Fallbacks for malformed application terms. Lenient by policy: an employer
// accepting an application should not be blocked on free-text the job poster
// wrote months earlier.
const DEFAULT_HOURS_PER_WEEK: u32 = 20;
const DEFAULT_DURATION_WEEKS: u32 = 12;

/// Money figures of a contract, derived from the application's free-text
/// terms before any funds move.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTerms {
    pub hours_per_week: Decimal,
    pub duration_weeks: u32,
    pub weekly_payment: Decimal,
    pub total_estimated_cost: Decimal,
}

impl ContractTerms {
    pub fn compute(
        hourly_rate: Decimal,
        hours_text: &str,
        duration_text: &str,
    ) -> Result<Self, EngineError> {
        let hours_per_week = parse_hours_per_week(hours_text);
        let duration_weeks = parse_duration_weeks(duration_text);
        let weekly_payment = hourly_rate
            .checked_mul(hours_per_week)
            .ok_or(EngineError::InvalidAmount)?;
        let total_estimated_cost = weekly_payment
            .checked_mul(Decimal::from(duration_weeks))
            .ok_or(EngineError::InvalidAmount)?;
        Ok(Self {
            hours_per_week,
            duration_weeks,
            weekly_payment,
            total_estimated_cost,
        })
    }
}

/// First numeric token of a free-text field, e.g. "about 25 hrs" -> 25.
fn first_number(text: &str) -> Option<Decimal> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .filter(|token| !token.is_empty())
        .find_map(|token| token.parse::<Decimal>().ok())
}

pub fn parse_hours_per_week(text: &str) -> Decimal {
    first_number(text)
        .filter(|h| *h > Decimal::ZERO)
        .unwrap_or_else(|| Decimal::from(DEFAULT_HOURS_PER_WEEK))
}

/// Parses "N day(s)|week(s)|month(s)" into whole weeks: days round up to a
/// week, months count as four weeks. Anything unparseable falls back to the
/// default.
pub fn parse_duration_weeks(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let Some(value) = first_number(&lower).filter(|v| *v > Decimal::ZERO) else {
        return DEFAULT_DURATION_WEEKS;
    };
    let weeks = if lower.contains("day") {
        value / Decimal::from(7)
    } else if lower.contains("week") {
        value
    } else if lower.contains("month") {
        value * Decimal::from(4)
    } else {
        return DEFAULT_DURATION_WEEKS;
    };
    weeks.ceil().to_u32().unwrap_or(DEFAULT_DURATION_WEEKS)
}
