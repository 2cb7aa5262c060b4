//! REST router.
//!
//! Serves `<rest_path>/<table>` in the PostgREST dialect:
//! - `GET` with `column=eq.value` filters, `order` and `limit`
//! - `POST` with a JSON row
//! - `DELETE` with at least one filter
//!
//! Every request needs a valid bearer token; the token's user is the
//! caller the row-level policy is evaluated for.

use crate::error::{PlatformError, PlatformResult};
use crate::platform::Platform;
use marks_protocol::{Filter, Method, NewBookmark, Order, RestRequest, RestResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes REST requests to the platform's tables.
#[derive(Clone)]
pub struct RestRouter {
    platform: Arc<Platform>,
}

struct QueryParams {
    filters: Vec<Filter>,
    order: Order,
    limit: Option<u32>,
}

impl RestRouter {
    /// Creates a router.
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }

    /// Handles a request authenticated by `bearer`.
    pub fn handle(&self, bearer: Option<&str>, request: &RestRequest) -> RestResponse {
        match self.dispatch(bearer, request) {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    warn!(method = request.method.as_str(), path = %request.path, "{e}");
                } else {
                    debug!(method = request.method.as_str(), path = %request.path, "{e}");
                }
                e.to_response()
            }
        }
    }

    fn dispatch(&self, bearer: Option<&str>, request: &RestRequest) -> PlatformResult<RestResponse> {
        let token = bearer
            .ok_or_else(|| PlatformError::AuthenticationFailed("missing bearer token".into()))?;
        let caller = self.platform.auth().validate(token)?.user_id;

        let table_name = self.table_name(&request.path)?;
        let table = self
            .platform
            .table(table_name)
            .ok_or_else(|| PlatformError::NotFound(format!("table {table_name}")))?;
        let params = parse_query(request)?;

        match request.method {
            Method::Get => {
                let snapshot = table.select(caller, &params.filters, params.order, params.limit);
                Ok(RestResponse::json(200, &snapshot)?)
            }
            Method::Post => {
                let record: NewBookmark = request.json()?;
                let stored = table.insert(caller, record)?;
                Ok(RestResponse::json(201, &stored)?)
            }
            Method::Delete => {
                table.delete(caller, &params.filters)?;
                Ok(RestResponse::no_content())
            }
        }
    }

    fn table_name<'a>(&self, path: &'a str) -> PlatformResult<&'a str> {
        let prefix = self.platform.config().rest_path.trim_end_matches('/');
        path.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }
}

fn parse_query(request: &RestRequest) -> PlatformResult<QueryParams> {
    let mut params = QueryParams {
        filters: Vec::new(),
        order: Order::default(),
        limit: None,
    };
    for (key, value) in &request.query {
        match key.as_str() {
            "order" => params.order = Order::parse(value)?,
            "limit" => {
                let limit = value
                    .parse()
                    .map_err(|_| PlatformError::InvalidRequest(format!("limit={value}")))?;
                params.limit = Some(limit);
            }
            column => params.filters.push(Filter::from_query(column, value)?),
        }
    }
    Ok(params)
}
