//! Page fetcher trait and HTTP implementation

use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::listing::ListingDecoder;
use crate::types::{Page, Params};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page the upstream will serve
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page request against a paginated resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Opaque resource identifier (the endpoint path)
    pub resource_id: String,
    /// Extra query parameters
    pub params: Params,
    /// Cursor of the page to fetch; `None` for the first page
    pub after: Option<String>,
    /// Page size
    pub limit: u32,
}

impl PageRequest {
    /// Create a first-page request
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            params: Params::new(),
            after: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the parameters
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set the cursor
    #[must_use]
    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.after = cursor;
        self
    }

    /// Set the page size, clamped to `1..=MAX_PAGE_SIZE`
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Build the query string pairs
    ///
    /// An explicit cursor overrides an `after` entry in `params`; a `limit`
    /// entry in `params` wins over the request's page size.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(k, _)| !(k.as_str() == "after" && self.after.is_some()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !self.params.contains_key("limit") {
            pairs.push(("limit".to_string(), self.limit.to_string()));
        }
        if let Some(after) = &self.after {
            pairs.push(("after".to_string(), after.clone()));
        }
        pairs
    }
}

/// Performs one bounded request for one page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single page
    ///
    /// Fails with `MissingCredential` without any I/O when `credential` is
    /// `None`.
    async fn fetch_page(&self, request: &PageRequest, credential: Option<&Credential>)
        -> Result<Page>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch_page(
        &self,
        request: &PageRequest,
        credential: Option<&Credential>,
    ) -> Result<Page> {
        (**self).fetch_page(request, credential).await
    }
}

/// Page fetcher backed by [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Arc<HttpClient>,
    decoder: ListingDecoder,
}

impl HttpPageFetcher {
    /// Create a fetcher over a client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            decoder: ListingDecoder::new(),
        }
    }

    /// The underlying client
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        request: &PageRequest,
        credential: Option<&Credential>,
    ) -> Result<Page> {
        let credential =
            credential.ok_or_else(|| Error::missing_credential(&request.resource_id))?;

        let config = RequestConfig {
            query: request.query_pairs(),
        };

        let body = self
            .client
            .get_json(&request.resource_id, &config, credential)
            .await?;
        let page = self.decoder.decode(&body)?;

        debug!(
            resource = %request.resource_id,
            items = page.items.len(),
            has_next = page.next_cursor.is_some(),
            "Fetched page"
        );
        Ok(page)
    }
}
