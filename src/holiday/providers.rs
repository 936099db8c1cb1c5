//! External holiday-data providers and the ordered fallback chain.
//!
//! Each provider exposes the same `HolidayProvider` contract and normalizes
//! its own response shape into [`Holiday`]. The chain tries providers in a
//! fixed preference order; any failure is logged and swallowed so resolution
//! can degrade to the local computation.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Holiday, HolidayKind};
use crate::dates;

const CALENDARIFIC_BASE_URL: &str = "https://calendarific.com/api/v2";
const ABSTRACT_BASE_URL: &str = "https://holidays.abstractapi.com/v1";
const HOLIDAY_API_BASE_URL: &str = "https://holidayapi.com/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub enum ProviderError {
    Http(reqwest::Error),
    Status(u16),
    Decode(serde_json::Error),
    Malformed(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Http(err) => write!(f, "http error: {err}"),
            ProviderError::Status(status) => write!(f, "unexpected status {status}"),
            ProviderError::Decode(err) => write!(f, "decode error: {err}"),
            ProviderError::Malformed(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

/// One external holiday-data source for a country/year pair.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, ProviderError>;
}

/// Environment-provided provider keys and client settings.
#[derive(Debug, Clone, Default)]
pub struct HolidaySourceConfig {
    pub calendarific_key: Option<String>,
    pub abstract_key: Option<String>,
    pub holiday_api_key: Option<String>,
    pub country: String,
    pub timeout_secs: u64,
}

impl HolidaySourceConfig {
    pub fn from_env() -> Self {
        Self {
            calendarific_key: env_key("CALENDARIFIC_API_KEY"),
            abstract_key: env_key("ABSTRACT_HOLIDAYS_API_KEY"),
            holiday_api_key: env_key("HOLIDAY_API_KEY"),
            country: std::env::var("HOLIDAY_COUNTRY").unwrap_or_else(|_| "BR".to_string()),
            timeout_secs: std::env::var("HOLIDAY_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// True when at least one provider key is present.
    pub fn is_configured(&self) -> bool {
        self.calendarific_key.is_some()
            || self.abstract_key.is_some()
            || self.holiday_api_key.is_some()
    }

    fn country(&self) -> &str {
        if self.country.is_empty() {
            "BR"
        } else {
            &self.country
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Ordered list of providers; the first successful non-empty result wins.
pub struct ProviderChain {
    providers: Vec<Box<dyn HolidayProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn HolidayProvider>>) -> Self {
        Self { providers }
    }

    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Build the chain from configured keys, preserving the preference order
    /// Calendarific -> AbstractAPI -> HolidayAPI.
    pub fn from_config(config: &HolidaySourceConfig) -> Result<Self, ProviderError> {
        let mut providers: Vec<Box<dyn HolidayProvider>> = Vec::new();
        if !config.is_configured() {
            return Ok(Self::new(providers));
        }

        let timeout = if config.timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            config.timeout_secs
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        if let Some(key) = &config.calendarific_key {
            providers.push(Box::new(Calendarific::new(
                client.clone(),
                key.clone(),
                config.country(),
            )));
        }
        if let Some(key) = &config.abstract_key {
            providers.push(Box::new(AbstractApi::new(
                client.clone(),
                key.clone(),
                config.country(),
            )));
        }
        if let Some(key) = &config.holiday_api_key {
            providers.push(Box::new(HolidayApi::new(
                client,
                key.clone(),
                config.country(),
            )));
        }
        Ok(Self::new(providers))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First successful non-empty result, or `None` when every provider
    /// failed (callers fall back to the local table).
    pub async fn fetch_year(&self, year: i32) -> Option<Vec<Holiday>> {
        for provider in &self.providers {
            match provider.fetch_year(year).await {
                Ok(holidays) if !holidays.is_empty() => {
                    debug!(
                        provider = provider.name(),
                        year,
                        count = holidays.len(),
                        "holiday provider answered"
                    );
                    return Some(holidays);
                }
                Ok(_) => {
                    warn!(
                        provider = provider.name(),
                        year, "holiday provider returned an empty set, trying next"
                    );
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        year,
                        error = %err,
                        "holiday provider failed, trying next"
                    );
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Calendarific
// ---------------------------------------------------------------------------

pub struct Calendarific {
    client: reqwest::Client,
    api_key: String,
    country: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CalendarificEnvelope {
    response: CalendarificResponse,
}

#[derive(Debug, Deserialize)]
struct CalendarificResponse {
    #[serde(default)]
    holidays: Vec<CalendarificHoliday>,
}

#[derive(Debug, Deserialize)]
struct CalendarificHoliday {
    name: String,
    #[serde(default)]
    description: Option<String>,
    date: CalendarificDate,
    #[serde(default, rename = "type")]
    kinds: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarificDate {
    iso: String,
}

impl Calendarific {
    pub fn new(client: reqwest::Client, api_key: String, country: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            country: country.into(),
            base_url: CALENDARIFIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl HolidayProvider for Calendarific {
    fn name(&self) -> &'static str {
        "calendarific"
    }

    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, ProviderError> {
        let url = format!("{}/holidays", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("country", self.country.as_str()),
                ("year", &year.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let envelope: CalendarificEnvelope = response.json().await?;
        normalize_calendarific(envelope)
    }
}

fn normalize_calendarific(envelope: CalendarificEnvelope) -> Result<Vec<Holiday>, ProviderError> {
    envelope
        .response
        .holidays
        .into_iter()
        .map(|entry| {
            // `iso` may carry a time suffix; only the date prefix matters.
            let prefix = entry.date.iso.get(..10).unwrap_or(&entry.date.iso);
            let date = dates::parse_wire_date(prefix).ok_or_else(|| {
                ProviderError::Malformed(format!("bad iso date '{}'", entry.date.iso))
            })?;
            Ok(Holiday {
                date,
                name: entry.name,
                kind: kind_from_label(entry.kinds.first().map(String::as_str).unwrap_or("")),
                description: entry.description.filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// AbstractAPI
// ---------------------------------------------------------------------------

pub struct AbstractApi {
    client: reqwest::Client,
    api_key: String,
    country: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AbstractHoliday {
    name: String,
    #[serde(default)]
    name_local: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// `MM/DD/YYYY`, unlike every other provider.
    date: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl AbstractApi {
    pub fn new(client: reqwest::Client, api_key: String, country: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            country: country.into(),
            base_url: ABSTRACT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl HolidayProvider for AbstractApi {
    fn name(&self) -> &'static str {
        "abstractapi"
    }

    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("country", self.country.as_str()),
                ("year", &year.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let entries: Vec<AbstractHoliday> = response.json().await?;
        normalize_abstract(entries)
    }
}

fn normalize_abstract(entries: Vec<AbstractHoliday>) -> Result<Vec<Holiday>, ProviderError> {
    entries
        .into_iter()
        .map(|entry| {
            let date = chrono::NaiveDate::parse_from_str(entry.date.trim(), "%m/%d/%Y")
                .or_else(|_| chrono::NaiveDate::parse_from_str(entry.date.trim(), "%Y-%m-%d"))
                .map_err(|_| {
                    ProviderError::Malformed(format!("bad date '{}'", entry.date))
                })?;
            let name = entry
                .name_local
                .filter(|local| !local.is_empty())
                .unwrap_or(entry.name);
            Ok(Holiday {
                date,
                name,
                kind: kind_from_label(entry.kind.as_deref().unwrap_or("")),
                description: entry.description.filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HolidayAPI
// ---------------------------------------------------------------------------

pub struct HolidayApi {
    client: reqwest::Client,
    api_key: String,
    country: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HolidayApiEnvelope {
    #[serde(default)]
    holidays: Vec<HolidayApiHoliday>,
}

#[derive(Debug, Deserialize)]
struct HolidayApiHoliday {
    name: String,
    date: String,
    #[serde(default)]
    public: bool,
}

impl HolidayApi {
    pub fn new(client: reqwest::Client, api_key: String, country: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            country: country.into(),
            base_url: HOLIDAY_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl HolidayProvider for HolidayApi {
    fn name(&self) -> &'static str {
        "holidayapi"
    }

    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, ProviderError> {
        let url = format!("{}/holidays", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("country", self.country.as_str()),
                ("year", &year.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let envelope: HolidayApiEnvelope = response.json().await?;
        normalize_holiday_api(envelope)
    }
}

fn normalize_holiday_api(envelope: HolidayApiEnvelope) -> Result<Vec<Holiday>, ProviderError> {
    envelope
        .holidays
        .into_iter()
        .map(|entry| {
            let date = dates::parse_wire_date(&entry.date).ok_or_else(|| {
                ProviderError::Malformed(format!("bad date '{}'", entry.date))
            })?;
            Ok(Holiday {
                date,
                name: entry.name,
                kind: if entry.public {
                    HolidayKind::Nacional
                } else {
                    HolidayKind::Outro
                },
                description: None,
            })
        })
        .collect()
}

fn kind_from_label(label: &str) -> HolidayKind {
    let label = label.to_ascii_lowercase();
    if label.contains("national") || label.contains("nacional") {
        HolidayKind::Nacional
    } else if label.contains("state") || label.contains("estadual") || label.contains("local") {
        HolidayKind::Estadual
    } else if label.contains("municipal") {
        HolidayKind::Municipal
    } else if label.contains("optional") || label.contains("facultativo") {
        HolidayKind::Facultativo
    } else {
        HolidayKind::Outro
    }
}
