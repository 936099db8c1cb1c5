use crate::holiday::Holiday;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a schedule entry: a row persisted by the backend, or a draft
/// that exists only in memory (auto-generated or not yet saved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum DeliveryKey {
    Persisted(u64),
    Draft(Uuid),
}

impl DeliveryKey {
    pub fn new_draft() -> Self {
        Self::Draft(Uuid::new_v4())
    }

    pub fn persisted_id(&self) -> Option<u64> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Draft(_) => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Draft(key) => write!(f, "draft-{key}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvalidDeliveryKey {
    input: String,
}

impl fmt::Display for InvalidDeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid delivery key '{}' (expected a numeric id or draft-<uuid>)",
            self.input
        )
    }
}

impl std::error::Error for InvalidDeliveryKey {}

impl FromStr for DeliveryKey {
    type Err = InvalidDeliveryKey;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if let Ok(id) = trimmed.parse::<u64>() {
            return Ok(Self::Persisted(id));
        }
        if let Some(raw) = trimmed.strip_prefix("draft-") {
            if let Ok(key) = Uuid::parse_str(raw) {
                return Ok(Self::Draft(key));
            }
        }
        Err(InvalidDeliveryKey {
            input: trimmed.to_string(),
        })
    }
}

/// Origin/category of a delivery. `Excluida` is a tombstone: it records that
/// an auto-generated delivery at its date was deliberately removed and must
/// not be re-materialized by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Semanal,
    Quinzenal,
    Mensal,
    Manual,
    Excluida,
}

impl DeliveryKind {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Excluida)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semanal => "semanal",
            Self::Quinzenal => "quinzenal",
            Self::Mensal => "mensal",
            Self::Manual => "manual",
            Self::Excluida => "excluida",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Scheduled,
    Pending,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    SameDay,
    Holiday,
}

/// One detected conflict. Deliveries on the same date share a single
/// descriptor referencing every involved key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub date: NaiveDate,
    pub kind: ConflictKind,
    pub involved: Vec<DeliveryKey>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday: Option<Holiday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub key: DeliveryKey,
    pub date: NaiveDate,
    pub kind: DeliveryKind,
    pub status: DeliveryStatus,
    pub schools: u32,
    pub products: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday: Option<Holiday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Delivery {
    /// Auto-generated schedule entry produced by the generator.
    pub fn generated(date: NaiveDate, kind: DeliveryKind, schools: u32, products: u32) -> Self {
        Self {
            key: DeliveryKey::new_draft(),
            date,
            kind,
            status: DeliveryStatus::Scheduled,
            schools,
            products,
            holiday: None,
            alternate_date: None,
            conflicts: Vec::new(),
            notes: None,
        }
    }

    /// Manual entry opened for creation and not yet saved.
    pub fn draft(date: NaiveDate, kind: DeliveryKind) -> Self {
        Self {
            status: DeliveryStatus::Pending,
            ..Self::generated(date, kind, 0, 0)
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Re-derive `status` from the invariant: `Conflict` iff any descriptors
    /// are attached; unsaved manual drafts stay `Pending`; everything else is
    /// `Scheduled`.
    pub(crate) fn refresh_status(&mut self) {
        self.status = if self.has_conflicts() {
            DeliveryStatus::Conflict
        } else if self.key.is_draft() && self.kind == DeliveryKind::Manual {
            DeliveryStatus::Pending
        } else {
            DeliveryStatus::Scheduled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_key_round_trips_through_strings() {
        let persisted = DeliveryKey::Persisted(42);
        assert_eq!(persisted.to_string(), "42");
        assert_eq!("42".parse::<DeliveryKey>().unwrap(), persisted);

        let draft = DeliveryKey::new_draft();
        let rendered = draft.to_string();
        assert!(rendered.starts_with("draft-"));
        assert_eq!(rendered.parse::<DeliveryKey>().unwrap(), draft);

        assert!("nonsense".parse::<DeliveryKey>().is_err());
        assert!("draft-not-a-uuid".parse::<DeliveryKey>().is_err());
    }

    #[test]
    fn status_follows_conflicts_and_save_state() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

        // unsaved manual entry stays pending until persisted
        let mut entry = Delivery::draft(date, DeliveryKind::Manual);
        assert_eq!(entry.status, DeliveryStatus::Pending);
        entry.refresh_status();
        assert_eq!(entry.status, DeliveryStatus::Pending);

        entry.key = DeliveryKey::Persisted(7);
        entry.refresh_status();
        assert_eq!(entry.status, DeliveryStatus::Scheduled);

        entry.conflicts.push(Conflict {
            date,
            kind: ConflictKind::SameDay,
            involved: vec![entry.key],
            message: "2 entregas agendadas para 10/06/2025.".to_string(),
            holiday: None,
            alternate_date: None,
        });
        assert!(entry.has_conflicts());
        entry.refresh_status();
        assert_eq!(entry.status, DeliveryStatus::Conflict);

        entry.conflicts.clear();
        entry.refresh_status();
        assert_eq!(entry.status, DeliveryStatus::Scheduled);
    }

    #[test]
    fn kind_wire_values_are_lowercase_portuguese() {
        assert_eq!(
            serde_json::to_string(&DeliveryKind::Excluida).unwrap(),
            "\"excluida\""
        );
        assert_eq!(
            serde_json::from_str::<DeliveryKind>("\"quinzenal\"").unwrap(),
            DeliveryKind::Quinzenal
        );
        assert!(DeliveryKind::Excluida.is_tombstone());
        assert!(!DeliveryKind::Manual.is_tombstone());
    }
}
