//! The backing document store seam consumed by the read caches.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::entities::Document;

pub const ARTICLES_COLLECTION: &str = "articles";
pub const CATEGORIES_COLLECTION: &str = "categories";

/// Failure category assigned by a store adapter.
///
/// Adapters own the mapping from their wire-level error representation into
/// this enum; everything above the adapter only looks at the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResourceExhausted,
    NotFound,
    TransientIo,
    Malformed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Read operations the caches need from the backing store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Newest-first scan of published articles, at most `limit` documents.
    async fn scan_published(&self, limit: usize) -> Result<Vec<Document>, StoreError>;

    /// Every document of a (small) collection, unordered.
    async fn scan_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
}
