//! REST backend over a PostgREST-style HTTP API.
//!
//! The HTTP client is abstracted via a trait so the engine does not depend
//! on a particular HTTP library. Tables map to `/rest/v1/<table>`, filters
//! to `column=op.value` query parameters, and ordering to `order=col.asc`.

use crate::backend::{RemoteBackend, RemoteResult};
use crate::error::RemoteError;
use async_trait::async_trait;
use serde_json::Value;
use walletsync_protocol::{Query, RemoteId, RemoteRow};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// An HTTP request produced by [`RestBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the first header with this name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. A transport
/// failure (no response at all) is reported as `Err`; non-2xx statuses are
/// returned as responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Remote backend speaking PostgREST conventions.
pub struct RestBackend<C: HttpClient> {
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    id_column: String,
    client: C,
}

impl<C: HttpClient> RestBackend<C> {
    /// Creates a backend for `base_url` (e.g. "https://project.example.com").
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            access_token: None,
            id_column: "id".into(),
            client,
        }
    }

    /// Sets the API key sent as `apikey`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the bearer token of the signed-in user.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the primary key column.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Builds the URL of a select.
    pub fn select_url(&self, table: &str, query: &Query) -> String {
        let mut params = vec!["select=*".to_string()];
        for predicate in &query.predicates {
            params.push(format!(
                "{}={}.{}",
                urlencoding::encode(&predicate.column),
                predicate.op.as_str(),
                urlencoding::encode(&filter_value(&predicate.value))
            ));
        }
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(format!("order={}.{direction}", urlencoding::encode(&order.column)));
        }
        format!("{}?{}", self.table_url(table), params.join("&"))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    fn row_url(&self, table: &str, id: &RemoteId) -> String {
        format!(
            "{}?{}=eq.{}",
            self.table_url(table),
            urlencoding::encode(&self.id_column),
            urlencoding::encode(id.as_str())
        )
    }

    fn request(&self, method: Method, url: String, body: Option<&RemoteRow>) -> RemoteResult<HttpRequest> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(key) = &self.api_key {
            headers.push(("apikey".into(), key.clone()));
        }
        if let Some(token) = &self.access_token {
            headers.push(("Authorization".into(), format!("Bearer {token}")));
        }
        if matches!(method, Method::Post | Method::Patch) {
            headers.push(("Prefer".into(), "return=representation".into()));
        }

        let body = match body {
            Some(row) => {
                headers.push(("Content-Type".into(), "application/json".into()));
                Some(serde_json::to_vec(row).map_err(|e| RemoteError::Decode(e.to_string()))?)
            }
            None => None,
        };
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    async fn send(&self, request: HttpRequest) -> RemoteResult<HttpResponse> {
        let response = self.client.send(request).await.map_err(RemoteError::Network)?;
        if response.is_success() {
            return Ok(response);
        }
        let message = String::from_utf8_lossy(&response.body).into_owned();
        Err(match response.status {
            400 | 409 | 422 => RemoteError::Rejected(message),
            status => RemoteError::Status { status, message },
        })
    }

    fn decode_rows(body: &[u8]) -> RemoteResult<Vec<RemoteRow>> {
        serde_json::from_slice(body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn decode_single(table: &str, body: &[u8]) -> RemoteResult<RemoteRow> {
        Self::decode_rows(body)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode(format!("{table}: empty representation")))
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl<C: HttpClient> RemoteBackend for RestBackend<C> {
    async fn select(&self, table: &str, query: &Query) -> RemoteResult<Vec<RemoteRow>> {
        let request = self.request(Method::Get, self.select_url(table, query), None)?;
        let response = self.send(request).await?;
        Self::decode_rows(&response.body)
    }

    async fn insert(&self, table: &str, payload: RemoteRow) -> RemoteResult<RemoteRow> {
        let request = self.request(Method::Post, self.table_url(table), Some(&payload))?;
        let response = self.send(request).await?;
        Self::decode_single(table, &response.body)
    }

    async fn update(&self, table: &str, id: &RemoteId, payload: RemoteRow) -> RemoteResult<RemoteRow> {
        let request = self.request(Method::Patch, self.row_url(table, id), Some(&payload))?;
        let response = self.send(request).await?;
        Self::decode_rows(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound {
                table: table.to_string(),
                id: id.clone(),
            })
    }

    async fn delete(&self, table: &str, id: &RemoteId) -> RemoteResult<()> {
        let request = self.request(Method::Delete, self.row_url(table, id), None)?;
        match self.send(request).await {
            Ok(_) | Err(RemoteError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
