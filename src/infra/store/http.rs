//! Document store reached over a REST document API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::application::repos::{DocumentStore, ErrorKind, StoreError};
use crate::domain::entities::Document;
use crate::infra::error::InfraError;

const EXHAUSTED_MARKER: &str = "RESOURCE_EXHAUSTED";

#[derive(Debug, Deserialize)]
struct DocumentPage {
    #[serde(default)]
    documents: Vec<Document>,
}

/// Map a non-success response onto the failure category the caches act on.
pub fn classify_status(status: StatusCode, body: &str) -> ErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains(EXHAUSTED_MARKER) {
        ErrorKind::ResourceExhausted
    } else if status == StatusCode::NOT_FOUND {
        ErrorKind::NotFound
    } else {
        ErrorKind::TransientIo
    }
}

#[derive(Clone, Debug)]
pub struct HttpDocumentStore {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(base: Url, api_key: Option<String>, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("pressroom/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::store_client(err.to_string()))?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
            api_key,
        })
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|err| StoreError::transient(format!("invalid store url `{path}`: {err}")))
    }

    async fn fetch(&self, url: Url) -> Result<Option<Vec<u8>>, StoreError> {
        let mut request = self.client.get(url.clone());
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| StoreError::transient(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| StoreError::transient(format!("reading {url} failed: {err}")))?;
        debug!(%url, %status, bytes = bytes.len(), "Store responded");

        if status.is_success() {
            return Ok(Some(bytes.to_vec()));
        }

        let body = String::from_utf8_lossy(&bytes);
        match classify_status(status, &body) {
            ErrorKind::NotFound => Ok(None),
            kind => Err(StoreError::new(kind, format!("status {status} body {body}"))),
        }
    }

    async fn fetch_page(&self, url: Url) -> Result<Vec<Document>, StoreError> {
        // A missing collection must not be cached as an empty one.
        let Some(bytes) = self.fetch(url.clone()).await? else {
            return Err(StoreError::transient(format!("collection not found at {url}")));
        };
        let page: DocumentPage = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::malformed(format!("failed to parse document page: {err}")))?;
        Ok(page.documents)
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn scan_published(&self, limit: usize) -> Result<Vec<Document>, StoreError> {
        let mut url = self.url("collections/articles/documents")?;
        url.query_pairs_mut()
            .append_pair("orderBy", "publishedAt")
            .append_pair("direction", "desc")
            .append_pair("limit", &limit.to_string())
            .append_pair("where", "status==published");
        self.fetch_page(url).await
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let url = self.url(&format!("collections/{collection}/documents"))?;
        self.fetch_page(url).await
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut url = self.url(&format!("collections/{collection}/documents/"))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::transient("store url cannot be a base"))?
            .pop_if_empty()
            .push(id);

        let Some(bytes) = self.fetch(url).await? else {
            return Ok(None);
        };
        let document = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::malformed(format!("failed to parse document `{id}`: {err}")))?;
        Ok(Some(document))
    }
}
