use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use std::fmt;

use crate::delivery::{Delivery, DeliveryKey, DeliveryKind, DeliveryStatus};

#[derive(Debug)]
pub enum PersistenceError {
    Http(reqwest::Error),
    Api { status: u16, message: String },
    Decode(SerdeJsonError),
    InvalidData(String),
    NotFound,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Http(err) => write!(f, "http error: {err}"),
            PersistenceError::Api { status, message } => {
                write!(f, "api rejected the request ({status}): {message}")
            }
            PersistenceError::Decode(err) => write!(f, "decode error: {err}"),
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::NotFound => write!(f, "no such delivery"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<reqwest::Error> for PersistenceError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Decode(value)
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// One persisted delivery row as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntregaRecord {
    pub id: u64,
    pub data_entrega: NaiveDate,
    pub tipo_entrega: DeliveryKind,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agrupamento_id: u64,
    #[serde(default)]
    pub agrupamento_nome: Option<String>,
    #[serde(default)]
    pub criado_em: Option<String>,
    #[serde(default)]
    pub atualizado_em: Option<String>,
}

impl EntregaRecord {
    /// Domain view of a persisted row. Counts are denormalized from the
    /// owning agrupamento; status and conflicts are recomputed downstream.
    pub fn into_delivery(self, schools: u32, products: u32) -> Delivery {
        Delivery {
            key: DeliveryKey::Persisted(self.id),
            date: self.data_entrega,
            kind: self.tipo_entrega,
            status: DeliveryStatus::Scheduled,
            schools,
            products,
            holiday: None,
            alternate_date: None,
            conflicts: Vec::new(),
            notes: self.observacoes,
        }
    }
}

/// Body for create and update calls. `data_entrega` serializes from local
/// calendar fields as `YYYY-MM-DD`; no timezone conversion is involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntregaPayload {
    pub data_entrega: NaiveDate,
    pub tipo_entrega: DeliveryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<String>,
}

impl EntregaPayload {
    pub fn new(date: NaiveDate, kind: DeliveryKind, notes: Option<String>) -> Self {
        Self {
            data_entrega: date,
            tipo_entrega: kind,
            observacoes: notes,
        }
    }
}

/// Backend persistence surface for delivery rows.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn list_month(
        &self,
        agrupamento_id: u64,
        year: i32,
        month: u32,
    ) -> PersistenceResult<Vec<EntregaRecord>>;

    async fn create(
        &self,
        agrupamento_id: u64,
        payload: &EntregaPayload,
    ) -> PersistenceResult<EntregaRecord>;

    async fn update(&self, id: u64, payload: &EntregaPayload) -> PersistenceResult<EntregaRecord>;

    async fn delete(&self, id: u64) -> PersistenceResult<()>;

    async fn fetch(&self, id: u64) -> PersistenceResult<EntregaRecord>;
}

// Deployments disagree on the list envelope: a bare array, `{items}`,
// `{data: [..]}`, or `{data: {items}}` all occur.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Plain(Vec<EntregaRecord>),
    Items { items: Vec<EntregaRecord> },
    Data { data: ListData },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListData {
    Plain(Vec<EntregaRecord>),
    Items { items: Vec<EntregaRecord> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordEnvelope {
    Plain(EntregaRecord),
    Data { data: EntregaRecord },
}

pub fn decode_record_list(value: serde_json::Value) -> PersistenceResult<Vec<EntregaRecord>> {
    let envelope: ListEnvelope = serde_json::from_value(value)?;
    Ok(match envelope {
        ListEnvelope::Plain(records) | ListEnvelope::Items { items: records } => records,
        ListEnvelope::Data { data } => match data {
            ListData::Plain(records) | ListData::Items { items: records } => records,
        },
    })
}

pub fn decode_record(value: serde_json::Value) -> PersistenceResult<EntregaRecord> {
    let envelope: RecordEnvelope = serde_json::from_value(value)?;
    Ok(match envelope {
        RecordEnvelope::Plain(record) | RecordEnvelope::Data { data: record } => record,
    })
}

pub mod http;

pub use http::HttpDeliveryStore;
