use chrono::{Datelike, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

mod easter;
pub mod providers;

pub use easter::{carnaval, corpus_christi, easter_sunday, sexta_feira_santa};
pub use providers::{HolidayProvider, HolidaySourceConfig, ProviderChain, ProviderError};

/// Brazilian national holidays that fall on the same month/day every year.
const FIXED_HOLIDAYS: [(u32, u32, &str); 9] = [
    (1, 1, "Confraternização Universal"),
    (4, 21, "Tiradentes"),
    (5, 1, "Dia do Trabalho"),
    (9, 7, "Independência do Brasil"),
    (10, 12, "Nossa Senhora Aparecida"),
    (11, 2, "Finados"),
    (11, 15, "Proclamação da República"),
    (11, 20, "Dia da Consciência Negra"),
    (12, 25, "Natal"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayKind {
    Nacional,
    Estadual,
    Municipal,
    Facultativo,
    #[serde(other)]
    Outro,
}

/// A single holiday occurrence on a concrete date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub kind: HolidayKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Holiday {
    pub fn new(date: NaiveDate, name: impl Into<String>, kind: HolidayKind) -> Self {
        Self {
            date,
            name: name.into(),
            kind,
            description: None,
        }
    }
}

/// The nine fixed national holidays for `year`; empty for years outside
/// chrono's date range.
pub fn fixed_table(year: i32) -> Vec<Holiday> {
    FIXED_HOLIDAYS
        .iter()
        .filter_map(|&(month, day, name)| {
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            Some(Holiday::new(date, name, HolidayKind::Nacional))
        })
        .collect()
}

/// Easter-relative feasts observed nationwide; empty for years outside
/// chrono's date range.
pub fn movable_feasts(year: i32) -> Vec<Holiday> {
    [
        (carnaval(year), "Carnaval", HolidayKind::Facultativo),
        (
            sexta_feira_santa(year),
            "Sexta-feira Santa",
            HolidayKind::Nacional,
        ),
        (
            corpus_christi(year),
            "Corpus Christi",
            HolidayKind::Facultativo,
        ),
    ]
    .into_iter()
    .filter_map(|(date, name, kind)| Some(Holiday::new(date?, name, kind)))
    .collect()
}

/// Fixed table plus movable feasts, sorted by date.
pub fn local_holidays(year: i32) -> Vec<Holiday> {
    let mut holidays = fixed_table(year);
    holidays.extend(movable_feasts(year));
    holidays.sort_by_key(|h| h.date);
    holidays
}

/// Year-cached holiday resolution over an external provider chain with a
/// local computed fallback.
pub struct HolidayCalendar {
    chain: ProviderChain,
    cache: Mutex<HashMap<i32, Arc<Vec<Holiday>>>>,
}

impl HolidayCalendar {
    pub fn new(chain: ProviderChain) -> Self {
        Self {
            chain,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Calendar that never leaves the process: local table only.
    pub fn offline() -> Self {
        Self::new(ProviderChain::empty())
    }

    /// Build from environment keys; an unusable chain degrades to offline.
    pub fn from_env() -> Self {
        let config = HolidaySourceConfig::from_env();
        match ProviderChain::from_config(&config) {
            Ok(chain) => {
                if chain.is_empty() {
                    debug!("no holiday provider keys configured, using local table");
                } else {
                    debug!(providers = ?chain.provider_names(), "holiday providers configured");
                }
                Self::new(chain)
            }
            Err(err) => {
                warn!(error = %err, "holiday provider setup failed, using local table");
                Self::offline()
            }
        }
    }

    /// Drop every cached year so the next lookup resolves fresh.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.cache.lock().keys().copied().collect();
        years.sort_unstable();
        years
    }

    /// All holidays of `year`, resolving and caching on first use.
    pub async fn holidays_in_year(&self, year: i32) -> Arc<Vec<Holiday>> {
        if let Some(cached) = self.cache.lock().get(&year) {
            return Arc::clone(cached);
        }
        let resolved = Arc::new(self.resolve_year(year).await);
        // Concurrent misses may resolve twice; the last insert wins.
        self.cache.lock().insert(year, Arc::clone(&resolved));
        resolved
    }

    /// The holiday falling on `date`, if any. Matching is by month and day
    /// within the resolved year set.
    pub async fn is_holiday(&self, date: NaiveDate) -> Option<Holiday> {
        let holidays = self.holidays_in_year(date.year()).await;
        holidays
            .iter()
            .find(|h| h.date.month() == date.month() && h.date.day() == date.day())
            .cloned()
    }

    pub async fn holidays_in_month(&self, year: i32, month: u32) -> Vec<Holiday> {
        let holidays = self.holidays_in_year(year).await;
        holidays
            .iter()
            .filter(|h| h.date.month() == month)
            .cloned()
            .collect()
    }

    /// Up to `limit` holidays on or after `date`, walking forward year by
    /// year.
    pub async fn holidays_from_date(&self, date: NaiveDate, limit: usize) -> Vec<Holiday> {
        let mut upcoming = Vec::with_capacity(limit);
        let mut year = date.year();
        while upcoming.len() < limit && year < date.year() + 10 {
            let holidays = self.holidays_in_year(year).await;
            for holiday in holidays.iter() {
                if holiday.date >= date && upcoming.len() < limit {
                    upcoming.push(holiday.clone());
                }
            }
            year += 1;
        }
        upcoming
    }

    async fn resolve_year(&self, year: i32) -> Vec<Holiday> {
        match self.chain.fetch_year(year).await {
            Some(remote) => merge_with_local(remote, year),
            None => {
                if !self.chain.is_empty() {
                    warn!(year, "every holiday provider failed, using local table");
                }
                local_holidays(year)
            }
        }
    }
}

/// Remote entries win; local entries fill the month/day slots the remote
/// set missed.
fn merge_with_local(remote: Vec<Holiday>, year: i32) -> Vec<Holiday> {
    let mut merged = remote;
    for local in local_holidays(year) {
        let covered = merged
            .iter()
            .any(|h| h.date.month() == local.date.month() && h.date.day() == local.date.day());
        if !covered {
            merged.push(local);
        }
    }
    merged.sort_by_key(|h| h.date);
    merged
}
