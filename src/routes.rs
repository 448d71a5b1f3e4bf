// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::prices::{get_health, get_market_prices, PriceQuery};
use crate::services::aggregate::PriceEngine;

// Recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found";
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = &api_error.message;
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error";
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    engine: Arc<PriceEngine>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let engine_filter = warp::any().map(move || engine.clone());

    let prices_route = warp::path!("api" / "v1" / "prices" / String / String)
        .and(warp::get())
        .and(warp::query::<PriceQuery>())
        .and(engine_filter.clone())
        .and_then(get_market_prices);

    let health_route = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(get_health);

    info!("All routes configured successfully.");

    prices_route.or(health_route).recover(handle_rejection)
}
