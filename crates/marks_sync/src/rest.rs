//! REST-backed bookmark store.
//!
//! Maps [`BookmarkStore`] calls onto PostgREST-style requests against the
//! platform's table endpoint and maps response statuses back onto
//! [`ViewError`] variants.

use crate::error::{ViewError, ViewResult};
use crate::transport::BookmarkStore;
use marks_protocol::{
    Bookmark, BookmarkId, Filter, Method, NewBookmark, Order, RestRequest, RestResponse, Snapshot,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends REST requests on behalf of a session.
///
/// Implementations attach the session credentials. An `Err` means the
/// request never produced a response.
#[allow(async_fn_in_trait)]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: RestRequest) -> Result<RestResponse, String>;
}

/// A [`BookmarkStore`] speaking the platform's REST dialect.
pub struct RestStore<C: HttpClient> {
    client: Arc<C>,
    base_path: String,
}

impl<C: HttpClient> RestStore<C> {
    /// Creates a store sending requests under `base_path` (e.g. `/rest/v1`).
    pub fn new(client: Arc<C>, base_path: impl Into<String>) -> Self {
        Self {
            client,
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn table_path(&self, table: &str) -> String {
        format!("{}/{}", self.base_path, table)
    }

    async fn execute(&self, request: RestRequest) -> ViewResult<RestResponse> {
        let method = request.method;
        let path = request.path.clone();
        let response = self
            .client
            .send(request)
            .await
            .map_err(ViewError::Transport)?;

        debug!(method = method.as_str(), path = %path, status = response.status, "rest response");
        if response.is_success() {
            return Ok(response);
        }

        let body = response.error_body();
        warn!(status = response.status, code = %body.code, "request failed: {}", body.message);
        Err(status_error(response.status, body.message))
    }
}

/// Maps a non-2xx status onto the view error taxonomy.
fn status_error(status: u16, message: String) -> ViewError {
    match status {
        401 => ViewError::Authentication(message),
        403 => ViewError::Authorization(message),
        400..=499 => ViewError::Rejected(message),
        _ => ViewError::Server(message),
    }
}

impl<C: HttpClient> BookmarkStore for RestStore<C> {
    async fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Order,
        limit: Option<u32>,
    ) -> ViewResult<Snapshot> {
        let mut request = RestRequest::new(Method::Get, self.table_path(table))
            .with_query(filter.column().name(), filter.query_value())
            .with_query("order", order.query_value());
        if let Some(limit) = limit {
            request = request.with_query("limit", limit.to_string());
        }

        let response = self.execute(request).await?;
        Ok(response.decode()?)
    }

    async fn insert(&self, table: &str, record: &NewBookmark) -> ViewResult<Bookmark> {
        let request = RestRequest::new(Method::Post, self.table_path(table)).with_json(record)?;
        let response = self.execute(request).await?;
        Ok(response.decode()?)
    }

    async fn delete(&self, table: &str, id: BookmarkId) -> ViewResult<()> {
        let filter = Filter::id(id);
        let request = RestRequest::new(Method::Delete, self.table_path(table))
            .with_query(filter.column().name(), filter.query_value());
        self.execute(request).await?;
        Ok(())
    }
}
