//! HTTP handlers for pool health queries.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::error;

use crate::adapters::http::error::ErrorResponse;
use crate::application::handlers::pool_health::PoolHealthMonitor;
use crate::domain::item::TaxonomyFilter;

/// Shared state for pool health endpoints.
#[derive(Clone)]
pub struct PoolHealthAppState {
    pub monitor: Arc<PoolHealthMonitor>,
}

/// Query string for `GET /api/pool-health`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolHealthQuery {
    /// JSON-encoded filter, e.g. `{"skill":["dsa"]}`. Absent means the whole pool.
    pub filter: Option<String>,
    pub threshold: Option<u32>,
}

/// GET /api/pool-health - Eligible count for one taxonomy bucket
pub async fn get_pool_health(
    State(state): State<PoolHealthAppState>,
    Query(query): Query<PoolHealthQuery>,
) -> Response {
    let filter = match query.filter.as_deref() {
        None => TaxonomyFilter::new(),
        Some(raw) => match serde_json::from_str::<TaxonomyFilter>(raw) {
            Ok(filter) => filter,
            Err(e) => {
                let body = ErrorResponse::bad_request(format!("Invalid filter: {}", e));
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
        },
    };

    match state.monitor.pool_health(&filter, query.threshold).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!(error = %e, bucket = %filter.bucket_key(), "pool health query failed");
            let body = ErrorResponse::internal("Pool index unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
