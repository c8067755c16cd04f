//! HTTP client for the warehouse REST API

use std::fmt;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::types::{ListQueriesRequest, QueryHistoryPage, WarehouseInfo};

const QUERY_HISTORY_PATH: &str = "api/2.0/sql/history/queries";
const WAREHOUSES_PATH: &str = "api/2.0/sql/warehouses";

const USER_AGENT: &str = concat!("warehouse-sdk/", env!("CARGO_PKG_VERSION"));

/// Authenticated client for one workspace
#[derive(Clone)]
pub struct WarehouseClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for WarehouseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl WarehouseClient {
    /// Create a client for `workspace_url`.
    ///
    /// `timeout` bounds every request, including reading the body.
    pub fn new(
        workspace_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = parse_base_url(workspace_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch one page of query history
    pub async fn list_queries(
        &self,
        request: &ListQueriesRequest,
    ) -> Result<QueryHistoryPage, ApiError> {
        self.send(Method::GET, QUERY_HISTORY_PATH, Some(request))
            .await
    }

    /// Fetch a warehouse descriptor
    pub async fn get_warehouse(&self, warehouse_id: &str) -> Result<WarehouseInfo, ApiError> {
        let path = format!("{}/{}", WAREHOUSES_PATH, warehouse_id);
        self.send::<(), _>(Method::GET, &path, None).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
            message: e.to_string(),
        })?;

        tracing::debug!(method = %method, url = %url, "Sending warehouse API request");

        let mut req = self.http.request(method, url).bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
                body: text,
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// Parse the workspace URL and normalize it to end with exactly one `/`,
/// so relative API paths join under it instead of replacing the last segment.
fn parse_base_url(workspace_url: &str) -> Result<Url, ApiError> {
    let trimmed = workspace_url.trim().trim_end_matches('/');
    let invalid = |message: String| ApiError::InvalidUrl {
        url: workspace_url.to_string(),
        message,
    };

    let url = Url::parse(&format!("{}/", trimmed)).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}
