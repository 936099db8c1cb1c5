use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use futures::future::join_all;

use crate::dates;
use crate::delivery::{Conflict, ConflictKind, Delivery, DeliveryKey};
use crate::holiday::{Holiday, HolidayCalendar};

/// Suggested substitute for a delivery landing on a holiday: one day
/// earlier, or two when the day before is a Sunday.
pub fn alternate_for(date: NaiveDate) -> NaiveDate {
    let candidate = date - Duration::days(1);
    if candidate.weekday() == Weekday::Sun {
        date - Duration::days(2)
    } else {
        candidate
    }
}

/// Re-derive the holiday annotations of every delivery. Stale holiday
/// descriptors are cleared first, so moving an entry off a holiday also
/// clears its flag. Distinct years resolve concurrently.
pub async fn annotate_holidays(
    mut deliveries: Vec<Delivery>,
    calendar: &HolidayCalendar,
) -> Vec<Delivery> {
    let mut years: Vec<i32> = deliveries.iter().map(|d| d.date.year()).collect();
    years.sort_unstable();
    years.dedup();
    let resolved = join_all(years.iter().map(|&year| calendar.holidays_in_year(year))).await;
    let by_year: HashMap<i32, Arc<Vec<Holiday>>> = years.into_iter().zip(resolved).collect();

    for delivery in &mut deliveries {
        delivery.conflicts.retain(|c| c.kind != ConflictKind::Holiday);
        delivery.holiday = None;
        delivery.alternate_date = None;

        if let Some(holiday) = by_year.get(&delivery.date.year()).and_then(|holidays| {
            holidays
                .iter()
                .find(|h| {
                    h.date.month() == delivery.date.month() && h.date.day() == delivery.date.day()
                })
                .cloned()
        }) {
            let alternate = alternate_for(delivery.date);
            delivery.conflicts.push(Conflict {
                date: delivery.date,
                kind: ConflictKind::Holiday,
                involved: vec![delivery.key],
                message: format!(
                    "Entrega em {} cai no feriado {}. Data alternativa sugerida: {}.",
                    dates::format_display_date(delivery.date),
                    holiday.name,
                    dates::format_display_date(alternate),
                ),
                holiday: Some(holiday.clone()),
                alternate_date: Some(alternate),
            });
            delivery.holiday = Some(holiday);
            delivery.alternate_date = Some(alternate);
        }
        delivery.refresh_status();
    }
    deliveries
}

/// Flag same-day collisions. Pure with respect to counts and notes; only
/// `conflicts` and `status` change. Each crowded date yields one shared
/// descriptor referencing every delivery on it, appended after any holiday
/// descriptors already present.
pub fn detect(mut deliveries: Vec<Delivery>) -> Vec<Delivery> {
    for delivery in &mut deliveries {
        delivery.conflicts.retain(|c| c.kind != ConflictKind::SameDay);
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (index, delivery) in deliveries.iter().enumerate() {
        by_date.entry(delivery.date).or_default().push(index);
    }

    for (date, indexes) in by_date {
        if indexes.len() < 2 {
            continue;
        }
        let involved: Vec<DeliveryKey> = indexes.iter().map(|&i| deliveries[i].key).collect();
        let descriptor = Conflict {
            date,
            kind: ConflictKind::SameDay,
            involved,
            message: format!(
                "{} entregas agendadas para {}.",
                indexes.len(),
                dates::format_display_date(date),
            ),
            holiday: None,
            alternate_date: None,
        };
        for &index in &indexes {
            deliveries[index].conflicts.push(descriptor.clone());
        }
    }

    for delivery in &mut deliveries {
        delivery.refresh_status();
    }
    deliveries
}
