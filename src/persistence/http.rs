use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{
    decode_record, decode_record_list, DeliveryStore, EntregaPayload, EntregaRecord,
    PersistenceError, PersistenceResult,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// `DeliveryStore` over the backend's periodicidade endpoints.
pub struct HttpDeliveryStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeliveryStore {
    pub fn new(base_url: impl Into<String>) -> PersistenceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn from_env() -> PersistenceResult<Self> {
        let base_url = std::env::var("ENTREGA_API_BASE_URL").map_err(|_| {
            PersistenceError::InvalidData("ENTREGA_API_BASE_URL is not set".to_string())
        })?;
        if base_url.trim().is_empty() {
            return Err(PersistenceError::InvalidData(
                "ENTREGA_API_BASE_URL is empty".to_string(),
            ));
        }
        Self::new(base_url.trim().to_string())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fail_with_body(response: reqwest::Response) -> PersistenceError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        PersistenceError::Api { status, message }
    }
}

#[async_trait]
impl DeliveryStore for HttpDeliveryStore {
    async fn list_month(
        &self,
        agrupamento_id: u64,
        year: i32,
        month: u32,
    ) -> PersistenceResult<Vec<EntregaRecord>> {
        debug!(agrupamento_id, year, month, "listing persisted deliveries");
        let response = self
            .client
            .get(self.url(&format!("/periodicidade/{agrupamento_id}/entregas")))
            .query(&[("mes", month.to_string()), ("ano", year.to_string())])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }
        decode_record_list(response.json().await?)
    }

    async fn create(
        &self,
        agrupamento_id: u64,
        payload: &EntregaPayload,
    ) -> PersistenceResult<EntregaRecord> {
        debug!(agrupamento_id, date = %payload.data_entrega, "creating delivery");
        let response = self
            .client
            .post(self.url(&format!("/periodicidade/{agrupamento_id}/entregas")))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }
        decode_record(response.json().await?)
    }

    async fn update(&self, id: u64, payload: &EntregaPayload) -> PersistenceResult<EntregaRecord> {
        debug!(id, date = %payload.data_entrega, "updating delivery");
        let response = self
            .client
            .put(self.url(&format!("/periodicidade/entregas/{id}")))
            .json(payload)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }
        decode_record(response.json().await?)
    }

    async fn delete(&self, id: u64) -> PersistenceResult<()> {
        debug!(id, "deleting delivery");
        let response = self
            .client
            .delete(self.url(&format!("/periodicidade/entregas/{id}")))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }
        Ok(())
    }

    async fn fetch(&self, id: u64) -> PersistenceResult<EntregaRecord> {
        let response = self
            .client
            .get(self.url(&format!("/periodicidade/entregas/{id}")))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }
        decode_record(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slashes() {
        let store =
            HttpDeliveryStore::with_client(reqwest::Client::new(), "http://localhost:8080/api/");
        assert_eq!(store.base_url(), "http://localhost:8080/api");
        assert_eq!(
            store.url("/periodicidade/7/entregas"),
            "http://localhost:8080/api/periodicidade/7/entregas"
        );
    }
}
