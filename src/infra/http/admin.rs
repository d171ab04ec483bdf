use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header::CONTENT_DISPOSITION},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    application::error::HttpError,
    cache::{CacheTarget, EditorialEvent, ReadCaches},
};

use super::middleware::log_responses;

const REPORT_DISPOSITION: &str = "attachment; filename=\"pressroom-cache-report.json\"";

#[derive(Clone)]
pub struct AdminState {
    pub caches: Arc<ReadCaches>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheQuery {
    #[serde(rename = "type")]
    target: Option<String>,
}

impl CacheQuery {
    /// A missing `type` addresses every cache.
    fn target(&self) -> Result<CacheTarget, HttpError> {
        match self.target.as_deref() {
            None => Ok(CacheTarget::All),
            Some(raw) => Ok(raw.parse()?),
        }
    }
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/cache/clear", post(clear_cache))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/report", get(cache_report))
        .route("/cache/writes", post(record_write))
        .route("/_health", get(health))
        .layer(middleware::from_fn(log_responses))
        .with_state(state)
}

async fn clear_cache(
    State(state): State<AdminState>,
    Query(query): Query<CacheQuery>,
) -> Result<StatusCode, HttpError> {
    let target = query.target()?;
    state.caches.admin.invalidate(target);
    Ok(StatusCode::NO_CONTENT)
}

async fn cache_stats(
    State(state): State<AdminState>,
    Query(query): Query<CacheQuery>,
) -> Result<Response, HttpError> {
    let target = query.target()?;
    Ok(Json(state.caches.admin.stats(target)).into_response())
}

async fn cache_report(State(state): State<AdminState>) -> Response {
    let mut response = Json(state.caches.admin.report()).into_response();
    response.headers_mut().insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static(REPORT_DISPOSITION),
    );
    response
}

async fn record_write(
    State(state): State<AdminState>,
    Json(event): Json<EditorialEvent>,
) -> StatusCode {
    state.caches.admin.record_write(&event);
    StatusCode::NO_CONTENT
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
