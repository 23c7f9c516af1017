use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{PriceSnapshotRow, SpreadSnapshotRow};
use crate::db::Store;
use crate::error::AppError;
use crate::types::PriceKind;

/// Read-only JSON endpoints over the snapshot history. The conversational
/// layer never goes through here; this serves dashboards and health probes.
#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/spread/latest", get(get_latest_spread))
        .route("/spread/history", get(get_spread_history))
        .route("/prices/latest", get(get_latest_price))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PriceQuery {
    pub kind: String,
}

async fn get_health(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshots = state.store.spread_snapshot_count().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "spread_snapshots": snapshots,
    })))
}

async fn get_latest_spread(
    State(state): State<ApiState>,
) -> Result<Json<Option<SpreadSnapshotRow>>, AppError> {
    Ok(Json(state.store.latest_spread_snapshot().await?))
}

async fn get_spread_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<SpreadSnapshotRow>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 1000);
    Ok(Json(state.store.recent_spread_snapshots(limit).await?))
}

async fn get_latest_price(
    State(state): State<ApiState>,
    Query(params): Query<PriceQuery>,
) -> Result<Json<Option<PriceSnapshotRow>>, AppError> {
    let kind = PriceKind::parse(&params.kind).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown price kind '{}' (expected buy, sell, media_buy or media_sell)",
            params.kind
        ))
    })?;
    Ok(Json(state.store.latest_price_snapshot(kind).await?))
}
