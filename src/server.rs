use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::aggregate::Aggregator;
use crate::config::{ResolvedConfig, ServerSettings};
use crate::domain::{CompoundQuery, CompoundRecord, PeakList};
use crate::error::HubError;
use crate::http::HttpBackend;
use crate::providers::MassbankClient;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub massbank: Arc<MassbankClient>,
    pub dedupe_by_default: bool,
}

impl AppState {
    pub fn from_config(config: &ResolvedConfig, backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            aggregator: Aggregator::from_config(config, backend.clone()),
            massbank: Arc::new(MassbankClient::new(config.massbank.clone(), backend)),
            dedupe_by_default: config.aggregation.dedupe,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default, alias = "peso")]
    pub weight: Option<String>,
    #[serde(default)]
    pub dedupe: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeakParams {
    #[serde(default)]
    pub peak_list: Option<String>,
    #[serde(default)]
    pub threshold: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/search_by_peaks", get(search_by_peaks))
        .route("/buscar", get(search))
        .route("/buscar_massbank_picos", get(search_by_peaks))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve(settings: &ServerSettings, state: AppState) -> Result<(), HubError> {
    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| HubError::Server(format!("bind {addr}: {err}")))?;
    tracing::info!(
        %addr,
        providers = ?state.aggregator.providers(),
        "compound search gateway listening"
    );
    axum::serve(listener, router(state))
        .await
        .map_err(|err| HubError::Server(err.to_string()))
}

async fn search(
    State(state): State<AppState>,
    params: Option<Query<SearchParams>>,
) -> Json<Vec<CompoundRecord>> {
    let params = params.map(|Query(params)| params).unwrap_or_default();
    let started = Instant::now();
    let query = CompoundQuery::new(
        params.name,
        params.formula,
        parse_number(params.weight.as_deref()),
    );
    let dedupe = parse_flag(params.dedupe.as_deref()).unwrap_or(state.dedupe_by_default);
    let records = if dedupe {
        state.aggregator.aggregate_deduplicated(&query).await
    } else {
        state.aggregator.aggregate(&query).await
    };
    tracing::info!(
        records = records.len(),
        dedupe,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "search served"
    );
    Json(records)
}

async fn search_by_peaks(
    State(state): State<AppState>,
    params: Option<Query<PeakParams>>,
) -> Json<Vec<CompoundRecord>> {
    let params = params.map(|Query(params)| params).unwrap_or_default();
    let peaks = PeakList::new(params.peak_list.as_deref().unwrap_or_default());
    let threshold = parse_number(params.threshold.as_deref());
    let response = state.massbank.search_by_peaks(&peaks, threshold).await;
    response.report.log();
    Json(response.records)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) => {
            tracing::warn!(value, "ignoring unparsable numeric parameter");
            None
        }
    }
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
