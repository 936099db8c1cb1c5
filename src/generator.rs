use std::fmt;

use chrono::Datelike;

use crate::dates;
use crate::delivery::Delivery;
use crate::rule::{Agrupamento, Recurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateError {
    InvalidMonth { year: i32, month: u32 },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::InvalidMonth { year, month } => {
                write!(f, "invalid month {month} of year {year}")
            }
        }
    }
}

impl std::error::Error for GenerateError {}

/// Expand an agrupamento's periodicity rule into the draft deliveries of one
/// month. Output is sorted by date and carries no conflict annotations; the
/// detector runs after reconciliation.
pub fn generate(
    agrupamento: &Agrupamento,
    year: i32,
    month: u32,
) -> Result<Vec<Delivery>, GenerateError> {
    let month_len =
        dates::month_length(year, month).ok_or(GenerateError::InvalidMonth { year, month })?;
    let rule = &agrupamento.rule;
    let kind = rule.recurrence.delivery_kind();

    let eligible: Vec<u32> = match rule.recurrence {
        Recurrence::Semanal => (1..=month_len).collect(),
        Recurrence::Quinzenal { quinzena } => quinzena.eligible_days(month_len),
        Recurrence::Mensal { tipo_mensal } => tipo_mensal.eligible_days(month_len),
    };

    // Day-outer walk keeps the output date-sorted without a fixup pass. A day
    // whose weekday falls outside the rule emits nothing.
    let deliveries = dates::days_of_month(year, month)
        .into_iter()
        .filter(|date| eligible.contains(&date.day()) && rule.matches_weekday(*date))
        .map(|date| Delivery::generated(date, kind, agrupamento.schools, agrupamento.products))
        .collect();
    Ok(deliveries)
}
