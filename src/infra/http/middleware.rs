use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{debug, error, warn};

use crate::{application::error::ErrorReport, cache::CacheName};

/// Which cache answered a public read, and how many records it returned.
/// An empty answer from a list cache is the visible face of a degraded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheRead {
    pub cache: CacheName,
    pub items: usize,
}

impl CacheRead {
    pub fn attach(self, mut response: Response) -> Response {
        response.extensions_mut().insert(self);
        response
    }

    fn is_empty_list(&self) -> bool {
        self.items == 0 && self.cache != CacheName::Article
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let read = response.extensions_mut().remove::<CacheRead>();
    let cache = read.map_or("none", |read| read.cache.as_str());

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "pressroom::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                cache,
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                "request failed",
            );
        } else {
            warn!(
                target = "pressroom::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                cache,
                elapsed_ms,
                source,
                detail = %detail,
                "client request error",
            );
        }
    } else if let Some(read) = read {
        if read.is_empty_list() {
            warn!(
                target = "pressroom::http::response",
                path = %uri.path(),
                cache,
                elapsed_ms,
                "served an empty list; the store may be unavailable",
            );
        } else {
            debug!(
                target = "pressroom::http::response",
                path = %uri.path(),
                cache,
                items = read.items,
                elapsed_ms,
                "served from cache",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, middleware, response::IntoResponse, routing::get};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn only_empty_lists_count_as_degraded() {
        let empty_feed = CacheRead {
            cache: CacheName::Articles,
            items: 0,
        };
        let record = CacheRead {
            cache: CacheName::Article,
            items: 0,
        };
        let categories = CacheRead {
            cache: CacheName::Categories,
            items: 3,
        };

        assert!(empty_feed.is_empty_list());
        assert!(!record.is_empty_list());
        assert!(!categories.is_empty_list());
    }

    #[tokio::test]
    async fn cache_read_is_consumed_by_the_logger() {
        let app = Router::new()
            .route(
                "/categories",
                get(|| async {
                    CacheRead {
                        cache: CacheName::Categories,
                        items: 2,
                    }
                    .attach("[]".into_response())
                }),
            )
            .layer(middleware::from_fn(log_responses));

        let request = Request::builder()
            .uri("/categories")
            .body(Body::empty())
            .expect("request should build");
        let response = app.oneshot(request).await.expect("router should respond");

        assert!(response.status().is_success());
        assert!(response.extensions().get::<CacheRead>().is_none());
    }
}
