use chrono::{Duration, NaiveDate};

/// Easter Sunday for `year`, via the Gauss/Meeus Gregorian computus: golden
/// number, century corrections, epact and full-moon offset reduce to a
/// month/day pair that always lands in March or April. `None` for years
/// outside chrono's date range.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Carnaval Tuesday: 47 days before Easter Sunday.
pub fn carnaval(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_sub_signed(Duration::days(47))
}

/// Sexta-feira Santa (Good Friday): 2 days before Easter Sunday.
pub fn sexta_feira_santa(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_sub_signed(Duration::days(2))
}

/// Corpus Christi: 60 days after Easter Sunday.
pub fn corpus_christi(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_add_signed(Duration::days(60))
}
