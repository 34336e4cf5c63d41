//! HTTP transport for the contact inbox.
//!
//! [`HttpGateway`] implements [`SyncGateway`] against the admin REST API:
//!
//! | operation          | request                                              |
//! |--------------------|------------------------------------------------------|
//! | fetch              | `GET    {base}/admin/contact/submissions?{query}`     |
//! | set read flag      | `PATCH  {base}/admin/contact/submissions/{id}` `{"isRead": b}` |
//! | set status         | `PATCH  {base}/admin/contact/submissions/{id}` `{"status": s}` |
//! | delete             | `DELETE {base}/admin/contact/submissions/{id}`        |
//!
//! Authentication is handled by pluggable [`TokenSource`] implementations.
//!
//! # Usage
//!
//! ```ignore
//! use openerp_contact::Inbox;
//! use openerp_contact_client::{HttpGateway, StaticToken};
//!
//! let gateway = HttpGateway::new("http://localhost:8080", Arc::new(StaticToken::new(jwt)));
//! let inbox = Inbox::new(Arc::new(gateway));
//! inbox.refresh().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use openerp_contact::gateway::decode;
use openerp_contact::{
    CanonicalQuery, FetchError, FetchPayload, FetchResponse, GatewayError, SubmissionStatus,
    SyncGateway,
};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Path of the submissions collection below the base URL.
pub const COLLECTION_PATH: &str = "admin/contact/submissions";

// ── Error ───────────────────────────────────────────────────────────

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl From<ApiError> for FetchError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Server { status, message } => FetchError::Server { status, message },
            ApiError::Network(e) => FetchError::Network(e.to_string()),
            ApiError::Auth(message) => FetchError::Server { status: 401, message },
            ApiError::Decode(message) => FetchError::Decode(message),
        }
    }
}

/// Client errors (4xx) mean the server looked at the change and refused it.
impl From<ApiError> for GatewayError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Server { status, message } if (400..500).contains(&status) => {
                GatewayError::Rejected(format!("HTTP {status}: {message}"))
            }
            ApiError::Server { status, message } => GatewayError::Server { status, message },
            ApiError::Network(e) => GatewayError::Network(e.to_string()),
            ApiError::Auth(message) => GatewayError::Rejected(format!("auth: {message}")),
            ApiError::Decode(message) => GatewayError::Network(format!("decode: {message}")),
        }
    }
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
///
/// Returns `Ok(None)` to skip the Authorization header.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// Anonymous requests.
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Static bearer token (already obtained externally).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

// ── HttpGateway ─────────────────────────────────────────────────────

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token_source)
    }

    /// Use a preconfigured client (timeouts, proxies, TLS roots).
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/admin/contact/submissions`
    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, COLLECTION_PATH)
    }

    /// `{base}/admin/contact/submissions?{query}`; no `?` for an empty query.
    fn list_url(&self, query: &CanonicalQuery) -> String {
        if query.is_empty() {
            self.collection_url()
        } else {
            format!("{}?{}", self.collection_url(), query)
        }
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id))
    }

    /// Attach the bearer token, if any.
    async fn authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    /// Map a non-success status to [`ApiError::Server`].
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Server { status: code, message: body })
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        let resp = Self::check(resp).await?;
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }

    async fn list(&self, query: &CanonicalQuery) -> Result<FetchPayload, ApiError> {
        let req = self.http.get(self.list_url(query));
        let req = self.authed(req).await?;
        let resp = req.send().await?;
        Self::parse(resp).await
    }

    async fn patch(&self, id: &str, body: serde_json::Value) -> Result<(), ApiError> {
        let req = self.http.patch(self.item_url(id)).json(&body);
        let req = self.authed(req).await?;
        let resp = req.send().await?;
        Self::check(resp).await.map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let req = self.http.delete(self.item_url(id));
        let req = self.authed(req).await?;
        let resp = req.send().await?;
        Self::check(resp).await.map(|_| ())
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn fetch_submissions(&self, query: &CanonicalQuery) -> Result<FetchResponse, FetchError> {
        debug!(url = %self.list_url(query), "GET submissions");
        let payload = self.list(query).await?;
        decode(payload)
    }

    async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), GatewayError> {
        debug!(id, is_read, "PATCH read flag");
        self.patch(id, serde_json::json!({ "isRead": is_read }))
            .await
            .map_err(GatewayError::from)
    }

    async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<(), GatewayError> {
        debug!(id, %status, "PATCH status");
        self.patch(id, serde_json::json!({ "status": status.as_str() }))
            .await
            .map_err(GatewayError::from)
    }

    async fn delete_submission(&self, id: &str) -> Result<(), GatewayError> {
        debug!(id, "DELETE submission");
        self.delete(id).await.map_err(GatewayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openerp_contact::{FilterSpec, build_query};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn gateway(base: &str) -> HttpGateway {
        HttpGateway::new(base, Arc::new(NoAuth))
    }

    // ========================================================================
    // Token sources
    // ========================================================================

    #[tokio::test]
    async fn no_auth_returns_none() {
        let ts = NoAuth;
        assert!(ts.token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_token_returns_value() {
        let ts = StaticToken::new("my-jwt-token");
        assert_eq!(ts.token().await.unwrap(), Some("my-jwt-token".to_string()));
    }

    // ========================================================================
    // URLs
    // ========================================================================

    #[test]
    fn urls_strip_trailing_slash() {
        let gw = gateway("http://localhost:8080/");
        assert_eq!(gw.base_url(), "http://localhost:8080");
        assert_eq!(
            gw.collection_url(),
            "http://localhost:8080/admin/contact/submissions"
        );
        assert_eq!(
            gw.item_url("c 1/x"),
            "http://localhost:8080/admin/contact/submissions/c%201%2Fx"
        );
    }

    #[test]
    fn list_url_carries_canonical_query() {
        let gw = gateway("http://h");
        assert_eq!(
            gw.list_url(&CanonicalQuery::default()),
            "http://h/admin/contact/submissions"
        );

        let q = build_query(
            &FilterSpec::default()
                .with_status(SubmissionStatus::Pending)
                .with_search("late fee"),
        );
        assert_eq!(
            gw.list_url(&q),
            "http://h/admin/contact/submissions?search=late%20fee&status=pending"
        );
    }

    // ========================================================================
    // Error mapping
    // ========================================================================

    #[test]
    fn client_errors_become_rejections() {
        let err: GatewayError = ApiError::Server { status: 404, message: "gone".into() }.into();
        assert_eq!(err, GatewayError::Rejected("HTTP 404: gone".into()));

        let err: GatewayError = ApiError::Server { status: 502, message: "bad".into() }.into();
        assert_eq!(err, GatewayError::Server { status: 502, message: "bad".into() });

        let err: GatewayError = ApiError::Auth("expired".into()).into();
        assert_eq!(err.error_code(), "REJECTED");
    }

    #[test]
    fn fetch_errors_keep_status() {
        let err: FetchError = ApiError::Server { status: 400, message: "bad status".into() }.into();
        assert_eq!(err, FetchError::Server { status: 400, message: "bad status".into() });

        let err: FetchError = ApiError::Decode("truncated".into()).into();
        assert_eq!(err.error_code(), "DECODE");
    }

    // ========================================================================
    // Round trips against a one-shot server
    // ========================================================================

    /// Accept one connection, answer with `status` and `body`, and hand
    /// back the raw request text.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            if k.eq_ignore_ascii_case("content-length") {
                                v.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\n\
                 content-type: application/json\r\n\
                 content-length: {}\r\n\
                 connection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn fetch_decodes_list_payload() {
        let body = serde_json::json!({
            "items": [{
                "id": "c-1",
                "name": "Ada",
                "email": "ada@example.com",
                "subject": "Hello",
                "message": "Hi",
                "category": "technical",
                "priority": "high",
                "status": "pending",
                "isRead": false,
                "createdAt": "2024-06-01T08:30:00Z"
            }],
            "stats": { "unreadCount": 1, "totalSubmissions": 5 }
        })
        .to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let gw = HttpGateway::new(base, Arc::new(StaticToken::new("t0k")));
        let q = build_query(&FilterSpec::default().with_read(Some(false)));

        let resp = gw.fetch_submissions(&q).await.unwrap();

        assert_eq!(resp.records.len(), 1);
        assert_eq!(resp.stats.total_submissions, 5);
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /admin/contact/submissions?isRead=false HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer t0k"));
    }

    #[tokio::test]
    async fn set_status_sends_patch_body() {
        let (base, server) = serve_once("204 No Content", String::new()).await;
        let gw = gateway(&base);

        gw.set_status("c-9", SubmissionStatus::InProgress).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PATCH /admin/contact/submissions/c-9 HTTP/1.1"));
        assert!(request.ends_with(r#"{"status":"in-progress"}"#));
        assert!(!request.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn rejected_delete_maps_to_gateway_rejection() {
        let (base, server) = serve_once("404 Not Found", "no such submission".into()).await;
        let gw = gateway(&base);

        let err = gw.delete_submission("c-404").await.unwrap_err();

        assert_eq!(err, GatewayError::Rejected("HTTP 404: no such submission".into()));
        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /admin/contact/submissions/c-404"));
    }

    #[tokio::test]
    async fn unknown_enum_in_payload_fails_fetch() {
        let body = serde_json::json!({
            "items": [{
                "id": "c-1", "name": "", "email": "", "subject": "", "message": "",
                "category": "gossip", "priority": "low", "status": "pending",
                "createdAt": "2024-06-01T08:30:00Z"
            }],
            "stats": { "unreadCount": 0, "totalSubmissions": 1 }
        })
        .to_string();
        let (base, _server) = serve_once("200 OK", body).await;

        let err = gateway(&base).fetch_submissions(&CanonicalQuery::default()).await.unwrap_err();

        assert_eq!(err.error_code(), "DECODE");
    }
}
