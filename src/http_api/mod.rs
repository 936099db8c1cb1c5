use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::dates;
use crate::delivery::{DeliveryKey, DeliveryKind};
use crate::holiday::Holiday;
use crate::persistence::PersistenceError;
use crate::planner::{DeliveryPlanner, MonthSummary, MonthView, PlannerError};
use crate::rule::Agrupamento;

#[derive(Clone)]
pub struct AppState {
    planner: Arc<RwLock<DeliveryPlanner>>,
}

impl AppState {
    pub fn new(planner: DeliveryPlanner) -> Self {
        Self {
            planner: Arc::new(RwLock::new(planner)),
        }
    }

    pub fn with_shared(planner: Arc<RwLock<DeliveryPlanner>>) -> Self {
        Self { planner }
    }

    fn planner(&self) -> Arc<RwLock<DeliveryPlanner>> {
        self.planner.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Upstream(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<PlannerError> for ApiError {
    fn from(value: PlannerError) -> Self {
        match value {
            PlannerError::Persistence(PersistenceError::NotFound) => {
                ApiError::NotFound("delivery not found".to_string())
            }
            PlannerError::Persistence(err) => ApiError::Upstream(err.to_string()),
            PlannerError::Generate(err) => ApiError::Invalid(err.to_string()),
            PlannerError::Stale(err) => ApiError::Conflict(err.to_string()),
            PlannerError::UnknownDelivery(key) => {
                ApiError::NotFound(format!("delivery {key} not found"))
            }
            PlannerError::NoMonthLoaded => ApiError::Invalid("no month loaded".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                let body = Json(ErrorBody {
                    error: "not_found",
                    message,
                });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Conflict(message) => {
                let body = Json(ErrorBody {
                    error: "conflict",
                    message,
                });
                (StatusCode::CONFLICT, body).into_response()
            }
            ApiError::Invalid(message) => {
                let body = Json(ErrorBody {
                    error: "invalid_request",
                    message,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Upstream(message) => {
                let body = Json(ErrorBody {
                    error: "upstream_error",
                    message,
                });
                (StatusCode::BAD_GATEWAY, body).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeliveryPayload {
    data_entrega: NaiveDate,
    tipo_entrega: DeliveryKind,
    #[serde(default)]
    observacoes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovePayload {
    nova_data: NaiveDate,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agrupamento", get(get_agrupamento))
        .route("/schedule/:year/:month", get(get_schedule))
        .route("/schedule/:year/:month/summary", get(get_schedule_summary))
        .route("/holidays/:year", get(list_holidays))
        .route("/holidays/:year/:month", get(list_month_holidays))
        .route("/deliveries", post(create_delivery))
        .route(
            "/deliveries/:key",
            axum::routing::put(update_delivery).delete(delete_delivery),
        )
        .route("/deliveries/:key/move", post(move_delivery))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, planner: DeliveryPlanner) -> std::io::Result<()> {
    let state = AppState::new(planner);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_agrupamento(State(state): State<AppState>) -> Json<Agrupamento> {
    let planner = state.planner();
    let agrupamento = {
        let guard = planner.read().await;
        guard.agrupamento().clone()
    };
    Json(agrupamento)
}

async fn get_schedule(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthView>, ApiError> {
    let planner = state.planner();
    let view = {
        let mut guard = planner.write().await;
        guard.load_month(year, month).await?.clone()
    };
    Ok(Json(view))
}

async fn get_schedule_summary(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthSummary>, ApiError> {
    let planner = state.planner();
    let summary = {
        let mut guard = planner.write().await;
        guard.load_month(year, month).await?;
        guard
            .summary()
            .ok_or_else(|| ApiError::invalid("no month loaded"))?
    };
    Ok(Json(summary))
}

async fn list_holidays(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<Vec<Holiday>>, ApiError> {
    check_year(year)?;
    let planner = state.planner();
    let holidays = {
        let guard = planner.read().await;
        guard.calendar().holidays_in_year(year).await
    };
    Ok(Json(holidays.as_ref().clone()))
}

async fn list_month_holidays(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Vec<Holiday>>, ApiError> {
    check_month(year, month)?;
    let planner = state.planner();
    let holidays = {
        let guard = planner.read().await;
        guard.calendar().holidays_in_month(year, month).await
    };
    Ok(Json(holidays))
}

async fn create_delivery(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryPayload>,
) -> Result<(StatusCode, Json<MonthView>), ApiError> {
    let planner = state.planner();
    let view = {
        let mut guard = planner.write().await;
        guard
            .create_delivery(
                payload.data_entrega,
                payload.tipo_entrega,
                payload.observacoes,
            )
            .await?
            .clone()
    };
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_delivery(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<DeliveryPayload>,
) -> Result<Json<MonthView>, ApiError> {
    let key = parse_key(&key)?;
    let planner = state.planner();
    let view = {
        let mut guard = planner.write().await;
        guard
            .update_delivery(
                key,
                payload.data_entrega,
                payload.tipo_entrega,
                payload.observacoes,
            )
            .await?
            .clone()
    };
    Ok(Json(view))
}

async fn delete_delivery(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let key = parse_key(&key)?;
    let planner = state.planner();
    {
        let mut guard = planner.write().await;
        guard.delete_delivery(key).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn move_delivery(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<MovePayload>,
) -> Result<Json<MonthView>, ApiError> {
    let key = parse_key(&key)?;
    let planner = state.planner();
    let view = {
        let mut guard = planner.write().await;
        guard.move_delivery(key, payload.nova_data).await?.clone()
    };
    Ok(Json(view))
}

fn parse_key(raw: &str) -> Result<DeliveryKey, ApiError> {
    DeliveryKey::from_str(raw).map_err(|err| ApiError::invalid(err.to_string()))
}

// Path validation for the holiday routes; the schedule routes get theirs
// from the generator.
fn check_year(year: i32) -> Result<(), ApiError> {
    match dates::first_day_of_month(year, 1) {
        Some(_) => Ok(()),
        None => Err(ApiError::invalid(format!("invalid year {year}"))),
    }
}

fn check_month(year: i32, month: u32) -> Result<(), ApiError> {
    match dates::month_length(year, month) {
        Some(_) => Ok(()),
        None => Err(ApiError::invalid(format!(
            "invalid month {month} of year {year}"
        ))),
    }
}
