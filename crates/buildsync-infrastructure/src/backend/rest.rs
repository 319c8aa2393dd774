//! PostgREST-style row access.
//!
//! `GET /rest/v1/{table}?col=eq.value&order=created_at.asc` for reads,
//! `POST`/`PATCH`/`DELETE` with the same filter syntax for mutations.
//! Read failures map to `BuildsyncError::Fetch`, write failures to
//! `BuildsyncError::Mutation` carrying the backend's message and code.

use buildsync_core::error::{BuildsyncError, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::auth::RestAuthProvider;

/// A row filter rendered as a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn is_in(column: impl Into<String>, values: Vec<String>) -> Self {
        Filter::In(column.into(), values)
    }

    fn to_query_pair(&self) -> (String, String) {
        match self {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
            Filter::In(column, values) => (column.clone(), format!("in.({})", values.join(","))),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    fn to_query_pair(&self) -> (String, String) {
        let direction = if self.ascending { "asc" } else { "desc" };
        ("order".to_string(), format!("{}.{}", self.column, direction))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Thin typed wrapper over the row endpoints.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    auth: RestAuthProvider,
}

impl RestClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let anon_key = anon_key.into();
        let auth = RestAuthProvider::new(http.clone(), base_url.clone(), anon_key.clone());
        Self {
            http,
            base_url,
            anon_key,
            auth,
        }
    }

    pub fn auth(&self) -> &RestAuthProvider {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    async fn request(&self, method: Method, table: &str, filters: &[Filter]) -> Result<RequestBuilder> {
        let token = self.auth.bearer_token().await?;
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let query: Vec<(String, String)> = filters.iter().map(Filter::to_query_pair).collect();
        Ok(self
            .http
            .request(method, url)
            .query(&query)
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }

    /// Fetches rows matching all `filters`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<T>> {
        let mut request = self
            .request(Method::GET, table, filters)
            .await?
            .query(&[("select", "*")]);
        if let Some(order) = order {
            request = request.query(&[order.to_query_pair()]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BuildsyncError::fetch(format!("{} query failed: {}", table, e)))?;
        let response = check_status(response, table, ErrorKind::Fetch).await?;
        response
            .json()
            .await
            .map_err(|e| BuildsyncError::fetch(format!("{} returned malformed rows: {}", table, e)))
    }

    /// Inserts one row and returns the stored representation.
    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T> {
        let request = self
            .request(Method::POST, table, &[])
            .await?
            .header("Prefer", "return=representation")
            .json(body);
        self.single_row(request, table).await
    }

    /// Updates rows matching `filters` and returns the first updated row.
    pub async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        body: &B,
    ) -> Result<T> {
        let request = self
            .request(Method::PATCH, table, filters)
            .await?
            .header("Prefer", "return=representation")
            .json(body);
        self.single_row(request, table).await
    }

    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        let response = self
            .request(Method::DELETE, table, filters)
            .await?
            .send()
            .await
            .map_err(|e| BuildsyncError::mutation(format!("{} delete failed: {}", table, e), None))?;
        check_status(response, table, ErrorKind::Mutation).await?;
        Ok(())
    }

    async fn single_row<T: DeserializeOwned>(&self, request: RequestBuilder, table: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| BuildsyncError::mutation(format!("{} write failed: {}", table, e), None))?;
        let response = check_status(response, table, ErrorKind::Mutation).await?;
        let rows: Vec<T> = response.json().await.map_err(|e| {
            BuildsyncError::mutation(format!("{} returned malformed row: {}", table, e), None)
        })?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BuildsyncError::not_found("row", table.to_string()))
    }
}

#[derive(Clone, Copy)]
enum ErrorKind {
    Fetch,
    Mutation,
}

async fn check_status(response: Response, table: &str, kind: ErrorKind) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
    let message = body
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| format!("{} responded {}", table, status));
    tracing::warn!("[Rest] {} {}: {}", table, status, message);

    Err(match kind {
        ErrorKind::Fetch => BuildsyncError::fetch(message),
        ErrorKind::Mutation => BuildsyncError::mutation(message, body.and_then(|b| b.code)),
    })
}
