use chrono::{Datelike, Duration, NaiveDate};

/// Number of days in the given month, or `None` for an invalid month/year.
pub fn month_length(year: i32, month: u32) -> Option<u32> {
    let last = last_day_of_month(year, month)?;
    Some(last.day())
}

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next_month - Duration::days(1))
}

/// Every date of the month in ascending order; empty for invalid input.
pub fn days_of_month(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = first_day_of_month(year, month) else {
        return Vec::new();
    };
    let mut days = Vec::with_capacity(31);
    let mut current = first;
    while current.month() == month {
        days.push(current);
        current += Duration::days(1);
    }
    days
}

/// Wire format used by the persistence API (`YYYY-MM-DD`). `NaiveDate` has no
/// time-of-day and no timezone, so this can never shift across hosts.
pub fn format_wire_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_wire_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Display format used in user-facing conflict messages (`DD/MM/YYYY`).
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_length_handles_leap_years() {
        assert_eq!(month_length(2024, 2), Some(29));
        assert_eq!(month_length(2025, 2), Some(28));
        assert_eq!(month_length(2025, 6), Some(30));
        assert_eq!(month_length(2025, 7), Some(31));
        assert_eq!(month_length(2025, 13), None);
    }

    #[test]
    fn days_of_month_covers_every_day_once() {
        let days = days_of_month(2025, 12);
        assert_eq!(days.len(), 31);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(days[30], NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn wire_date_round_trips_without_day_shift() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(format_wire_date(date), "2025-01-01");
        assert_eq!(parse_wire_date("2025-01-01"), Some(date));
        assert_eq!(parse_wire_date(" 2025-01-01 "), Some(date));
        assert_eq!(parse_wire_date("01/01/2025"), None);
    }
}
