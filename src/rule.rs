use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryKind;

/// Fortnight sub-selector for biweekly rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuinzenaSelector {
    PrimeiraQuinzena,
    SegundaQuinzena,
    SemanasImpares,
    SemanasPares,
    UltimaSemana,
}

impl QuinzenaSelector {
    /// Eligible days of the month (1-based) for a month of `month_len` days.
    /// Odd/even selectors partition the month into fixed 7-day blocks:
    /// block 1 = days 1-7, block 2 = days 8-14, and so on, the last block
    /// clipped to the month length.
    pub fn eligible_days(&self, month_len: u32) -> Vec<u32> {
        match self {
            Self::PrimeiraQuinzena => (1..=15.min(month_len)).collect(),
            Self::SegundaQuinzena => (16..=month_len).collect(),
            Self::SemanasImpares => seven_day_blocks(month_len, true),
            Self::SemanasPares => seven_day_blocks(month_len, false),
            Self::UltimaSemana => (month_len.saturating_sub(6)..=month_len).collect(),
        }
    }
}

fn seven_day_blocks(month_len: u32, odd: bool) -> Vec<u32> {
    let mut days = Vec::new();
    let mut block = 1u32;
    loop {
        let start = (block - 1) * 7 + 1;
        if start > month_len {
            break;
        }
        let end = (block * 7).min(month_len);
        if (block % 2 == 1) == odd {
            days.extend(start..=end);
        }
        block += 1;
    }
    days
}

/// Day-of-month sub-selector for monthly rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MensalSelector {
    Primeira,
    Ultima,
    PrimeiraUltima,
}

impl MensalSelector {
    pub fn eligible_days(&self, month_len: u32) -> Vec<u32> {
        match self {
            Self::Primeira => vec![1],
            Self::Ultima => vec![month_len],
            Self::PrimeiraUltima => vec![1, month_len],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recurrence {
    Semanal,
    Quinzenal { quinzena: QuinzenaSelector },
    Mensal { tipo_mensal: MensalSelector },
}

impl Recurrence {
    /// The delivery kind stamped on entries generated under this recurrence.
    pub fn delivery_kind(&self) -> DeliveryKind {
        match self {
            Self::Semanal => DeliveryKind::Semanal,
            Self::Quinzenal { .. } => DeliveryKind::Quinzenal,
            Self::Mensal { .. } => DeliveryKind::Mensal,
        }
    }
}

/// Recurrence rule owned by an agrupamento's configuration; read-only input
/// to the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PeriodicityRuleWire")]
pub struct PeriodicityRule {
    pub recurrence: Recurrence,
    weekdays: Vec<Weekday>,
}

/// Wire shape of [`PeriodicityRule`]: deserialization funnels through
/// [`PeriodicityRule::new`], so stored rules carry the same sorted, deduped
/// weekday set as constructed ones.
#[derive(Deserialize)]
struct PeriodicityRuleWire {
    recurrence: Recurrence,
    weekdays: Vec<Weekday>,
}

impl From<PeriodicityRuleWire> for PeriodicityRule {
    fn from(wire: PeriodicityRuleWire) -> Self {
        Self::new(wire.recurrence, wire.weekdays)
    }
}

impl PeriodicityRule {
    pub fn new<I>(recurrence: Recurrence, weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut weekdays: Vec<Weekday> = weekdays.into_iter().collect();
        weekdays.sort_by_key(|wd| wd.num_days_from_monday());
        weekdays.dedup_by(|a, b| a.num_days_from_monday() == b.num_days_from_monday());
        Self {
            recurrence,
            weekdays,
        }
    }

    pub fn semanal<I>(weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self::new(Recurrence::Semanal, weekdays)
    }

    pub fn quinzenal<I>(quinzena: QuinzenaSelector, weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self::new(Recurrence::Quinzenal { quinzena }, weekdays)
    }

    pub fn mensal<I>(tipo_mensal: MensalSelector, weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self::new(Recurrence::Mensal { tipo_mensal }, weekdays)
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn matches_weekday(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday())
    }
}

/// The grouping entity (school cluster or contract) that owns a periodicity
/// rule. Supplies the denormalized display counts carried by generated
/// deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agrupamento {
    pub id: u64,
    pub nome: String,
    #[serde(default)]
    pub schools: u32,
    #[serde(default)]
    pub products: u32,
    pub rule: PeriodicityRule,
}

impl Default for Agrupamento {
    fn default() -> Self {
        Self {
            id: 1,
            nome: "Agrupamento sem nome".to_string(),
            schools: 0,
            products: 0,
            rule: PeriodicityRule::semanal([Weekday::Mon, Weekday::Wed, Weekday::Fri]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekdays_are_normalized_and_deduped() {
        let rule = PeriodicityRule::semanal([Weekday::Fri, Weekday::Mon, Weekday::Fri]);
        assert_eq!(rule.weekdays(), &[Weekday::Mon, Weekday::Fri]);
    }

    #[test]
    fn quinzena_blocks_partition_the_month() {
        for month_len in [28, 29, 30, 31] {
            let mut all: Vec<u32> = QuinzenaSelector::SemanasImpares.eligible_days(month_len);
            all.extend(QuinzenaSelector::SemanasPares.eligible_days(month_len));
            all.sort_unstable();
            let expected: Vec<u32> = (1..=month_len).collect();
            assert_eq!(all, expected, "month_len={month_len}");
        }
    }

    #[test]
    fn ultima_semana_is_the_last_seven_days() {
        assert_eq!(
            QuinzenaSelector::UltimaSemana.eligible_days(31),
            (25..=31).collect::<Vec<_>>()
        );
        assert_eq!(
            QuinzenaSelector::UltimaSemana.eligible_days(28),
            (22..=28).collect::<Vec<_>>()
        );
    }

    #[test]
    fn mensal_selectors_pick_month_edges() {
        assert_eq!(MensalSelector::Primeira.eligible_days(30), vec![1]);
        assert_eq!(MensalSelector::Ultima.eligible_days(30), vec![30]);
        assert_eq!(MensalSelector::PrimeiraUltima.eligible_days(30), vec![1, 30]);
    }

    #[test]
    fn recurrence_serde_uses_portuguese_tags() {
        let rule = PeriodicityRule::quinzenal(
            QuinzenaSelector::PrimeiraQuinzena,
            [Weekday::Tue],
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["recurrence"]["kind"], "quinzenal");
        assert_eq!(json["recurrence"]["quinzena"], "primeira_quinzena");
    }

    #[test]
    fn deserialized_weekdays_are_normalized_too() {
        let rule: PeriodicityRule = serde_json::from_value(serde_json::json!({
            "recurrence": { "kind": "semanal" },
            "weekdays": ["Fri", "Mon", "Fri", "Mon"]
        }))
        .unwrap();
        assert_eq!(rule.weekdays(), &[Weekday::Mon, Weekday::Fri]);
    }
}
