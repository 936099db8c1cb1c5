use chrono::{NaiveDate, Weekday};

use entrega_tool::holiday::HolidayCalendar;
use entrega_tool::rule::{Agrupamento, MensalSelector, PeriodicityRule, QuinzenaSelector};
use entrega_tool::{
    ConflictKind, Delivery, DeliveryKind, DeliveryStatus, annotate_holidays, detect, generate,
};

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn agrupamento_with(rule: PeriodicityRule) -> Agrupamento {
    Agrupamento {
        id: 3,
        nome: "Agrupamento Leste".to_string(),
        schools: 8,
        products: 6,
        rule,
    }
}

// November 2025 starts on a Saturday; Thursdays fall on 6, 13, 20 and 27.
// November 20 is Dia da Consciência Negra.

#[tokio::test]
async fn quinzenal_schedule_is_annotated_end_to_end() {
    let agrupamento = agrupamento_with(PeriodicityRule::quinzenal(
        QuinzenaSelector::SegundaQuinzena,
        [Weekday::Thu],
    ));
    let calendar = HolidayCalendar::offline();

    let generated = generate(&agrupamento, 2025, 11).unwrap();
    let deliveries = detect(annotate_holidays(generated, &calendar).await);

    let dates: Vec<NaiveDate> = deliveries.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![ymd(2025, 11, 20), ymd(2025, 11, 27)]);
    assert!(deliveries.iter().all(|d| d.kind == DeliveryKind::Quinzenal));

    let flagged = &deliveries[0];
    assert_eq!(flagged.status, DeliveryStatus::Conflict);
    assert_eq!(
        flagged.holiday.as_ref().unwrap().name,
        "Dia da Consciência Negra"
    );
    assert_eq!(flagged.alternate_date, Some(ymd(2025, 11, 19)));

    assert_eq!(deliveries[1].status, DeliveryStatus::Scheduled);
    assert!(deliveries[1].conflicts.is_empty());
}

#[tokio::test]
async fn manual_entry_collides_with_the_generated_schedule() {
    let agrupamento = agrupamento_with(PeriodicityRule::semanal([Weekday::Thu]));
    let calendar = HolidayCalendar::offline();

    let mut deliveries = generate(&agrupamento, 2025, 11).unwrap();
    deliveries.push(Delivery::generated(
        ymd(2025, 11, 20),
        DeliveryKind::Manual,
        0,
        0,
    ));
    let deliveries = detect(annotate_holidays(deliveries, &calendar).await);

    let on_holiday: Vec<&Delivery> = deliveries
        .iter()
        .filter(|d| d.date == ymd(2025, 11, 20))
        .collect();
    assert_eq!(on_holiday.len(), 2);
    for delivery in on_holiday {
        let kinds: Vec<ConflictKind> = delivery.conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConflictKind::Holiday, ConflictKind::SameDay]);
        assert_eq!(delivery.status, DeliveryStatus::Conflict);
    }
}

#[tokio::test]
async fn mensal_first_and_last_respect_weekdays_through_the_pipeline() {
    // November 1 is a Saturday, November 30 a Sunday: only the first day
    // survives a Saturday-pinned rule.
    let agrupamento = agrupamento_with(PeriodicityRule::mensal(
        MensalSelector::PrimeiraUltima,
        [Weekday::Sat],
    ));
    let calendar = HolidayCalendar::offline();

    let generated = generate(&agrupamento, 2025, 11).unwrap();
    let deliveries = detect(annotate_holidays(generated, &calendar).await);

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].date, ymd(2025, 11, 1));
    assert_eq!(deliveries[0].kind, DeliveryKind::Mensal);
    assert_eq!(deliveries[0].status, DeliveryStatus::Scheduled);
    assert_eq!(deliveries[0].schools, 8);
    assert_eq!(deliveries[0].products, 6);
}
