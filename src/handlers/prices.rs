// src/handlers/prices.rs
use std::sync::Arc;

use log::info;
use serde::Deserialize;
use warp::Rejection;

use crate::handlers::error::ApiError;
use crate::models::PriceResponse;
use crate::services::aggregate::PriceEngine;

const DEFAULT_LIMIT: usize = 5;

/// `limit` is taken as a raw string so a malformed value gets a 400 with a
/// message instead of warp's opaque query rejection. Out-of-range numeric
/// values are still clamped by the engine, not rejected.
#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub limit: Option<String>,
}

/// `GET /api/v1/prices/{state}/{commodity}?limit=N`
///
/// Always answers with a best-effort, non-empty list; degraded paths are
/// reported through `sources` and `metadata`, not through error statuses.
pub async fn get_market_prices(
    state: String,
    commodity: String,
    query: PriceQuery,
    engine: Arc<PriceEngine>,
) -> Result<impl warp::Reply, Rejection> {
    let limit = match query.limit.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            warp::reject::custom(ApiError::bad_request(format!(
                "limit must be a non-negative integer, got {raw:?}"
            )))
        })?,
        None => DEFAULT_LIMIT,
    };
    info!("Handling price request: {commodity} in {state}, limit {limit}");

    let result = engine.get_prices(&state, &commodity, limit).await;

    let response = PriceResponse {
        success: !result.records.is_empty(),
        total: result.records.len(),
        data: result.records,
        sources: result.sources,
        metadata: result.metadata,
    };

    Ok(warp::reply::json(&response))
}

/// `GET /api/v1/health`
pub async fn get_health(engine: Arc<PriceEngine>) -> Result<impl warp::Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "ok",
        "cache_entries": engine.cache_len(),
    })))
}
