use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::error::HttpError,
    cache::{CacheName, ReadCaches},
};

use super::middleware::{CacheRead, log_responses};

#[derive(Clone)]
pub struct HttpState {
    pub caches: Arc<ReadCaches>,
}

/// Read-only JSON routes served from the caches. They never surface store
/// failures: a degraded read is an empty list or a 404.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/articles", get(articles))
        .route("/articles/{id}", get(article))
        .route("/categories", get(categories))
        .layer(middleware::from_fn(log_responses))
        .with_state(state)
}

async fn articles(State(state): State<HttpState>) -> Response {
    let articles = state.caches.articles.load().await;
    CacheRead {
        cache: CacheName::Articles,
        items: articles.len(),
    }
    .attach(Json(articles.as_slice()).into_response())
}

async fn categories(State(state): State<HttpState>) -> Response {
    let categories = state.caches.categories.load().await;
    CacheRead {
        cache: CacheName::Categories,
        items: categories.len(),
    }
    .attach(Json(categories.as_slice()).into_response())
}

async fn article(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    let read = |items| CacheRead {
        cache: CacheName::Article,
        items,
    };
    match state.caches.article.load(&id).await {
        Some(record) => read(1).attach(Json(record).into_response()),
        None => read(0).attach(
            HttpError::new(
                "infra::http::public::article",
                StatusCode::NOT_FOUND,
                "Article not found",
                format!("article `{id}` is not available"),
            )
            .into_response(),
        ),
    }
}
