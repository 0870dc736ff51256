use std::env;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::backend::ChatBackend;
use crate::error::{Error, Result};
use crate::ndjson::ByteStream;
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UNAUTHORIZED,
};
use crate::types::{AuthUser, LoginResponse, NewSession, ProtocolRecord, Session};

/// Environment variable consulted when no base URL is given.
pub const BASE_URL_ENV: &str = "PARLEY_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the agents backend.
///
/// Authentication is cookie based: after [`ChatBackend::login`] the client's
/// cookie store carries the `access-token` cookie on every request.  No overall
/// request timeout is set because chat responses stream for as long as the
/// agent runs; only connecting is bounded.
#[derive(Debug, Clone)]
pub struct AgentsClient {
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
}

impl AgentsClient {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the PARLEY_BASE_URL
    /// environment variable; it defaults to a backend on localhost.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, connect_timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .cookie_store(true)
            .default_headers(Self::default_headers())
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    /// The URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Send a request, turning transport failures and non-success statuses
    /// into errors.
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = request.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            self.transport_error(e)
        })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    ///
    /// The status decides the variant.  An unreadable body only costs the
    /// message, so a 401 is still reported as a 401.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(status_code, error = %e, "could not read error response body");
                String::new()
            }
        };
        error_for_status(status_code, error_message(status_code, error_body))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }
}

/// Pulls the message out of an error body.
///
/// FastAPI reports errors as `{"detail": <string or structure>}`; anything
/// else is passed through, and an empty body becomes `HTTP <status>`.
fn error_message(status_code: u16, error_body: String) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        detail: Option<serde_json::Value>,
    }

    if error_body.trim().is_empty() {
        return format!("HTTP {status_code}");
    }
    serde_json::from_str::<ErrorResponse>(&error_body)
        .ok()
        .and_then(|e| e.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(error_body)
}

fn error_for_status(status_code: u16, error_message: String) -> Error {
    match status_code {
        400 | 422 => Error::bad_request(error_message),
        401 => {
            CLIENT_UNAUTHORIZED.click();
            Error::authentication(error_message)
        }
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message, None, None),
        408 => Error::timeout(error_message, None),
        500 => Error::internal_server(error_message),
        502..=504 => Error::service_unavailable(error_message),
        _ => Error::api(status_code, error_message),
    }
}

#[async_trait::async_trait]
impl ChatBackend for AgentsClient {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let url = self.endpoint("sessions/")?;
        let response = self.execute(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    async fn create_session(&self, agent_name: &str) -> Result<NewSession> {
        let url = self.endpoint("sessions/new")?;
        let request = self.client.post(url).json(&json!({ "agent_name": agent_name }));
        let response = self.execute(request).await?;
        Self::read_json(response).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct DeleteResponse {
            #[serde(default = "default_success")]
            success: bool,
        }

        fn default_success() -> bool {
            true
        }

        let mut url = self.endpoint("sessions/")?;
        url.path_segments_mut()
            .map_err(|_| Error::url("base URL cannot have path segments", None))?
            .pop_if_empty()
            .push(session_id);
        let response = self.execute(self.client.delete(url)).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if body.trim().is_empty() {
            return Ok(true);
        }
        let parsed: DeleteResponse = serde_json::from_str(&body)?;
        Ok(parsed.success)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ProtocolRecord>> {
        let url = self.endpoint("chat/")?;
        let request = self.client.get(url).query(&[("session_id", session_id)]);
        let response = self.execute(request).await?;
        Self::read_json(response).await
    }

    async fn submit_prompt(&self, session_id: &str, prompt: &str) -> Result<ByteStream> {
        let url = self.endpoint("chat/")?;
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("session_id", session_id.to_string());
        let request = self
            .client
            .post(url)
            .header(header::ACCEPT, HeaderValue::from_static("text/plain"))
            .multipart(form);
        let response = self.execute(request).await?;
        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn agents(&self) -> Result<Vec<String>> {
        let url = self.endpoint("agents/")?;
        let response = self.execute(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    async fn login(&self, credential: &str) -> Result<AuthUser> {
        let url = self.endpoint("auth/google")?;
        let request = self.client.post(url).json(&json!({ "credential": credential }));
        let response = self.execute(request).await?;
        let login: LoginResponse = Self::read_json(response).await?;
        Ok(login.user)
    }

    async fn logout(&self) -> Result<()> {
        let url = self.endpoint("logout")?;
        self.execute(self.client.post(url)).await?;
        Ok(())
    }
}

/// Parse a base URL, making sure relative endpoints resolve beneath it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = AgentsClient::new(Some("http://backend.example:8000".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://backend.example:8000/");
        assert_eq!(client.connect_timeout, DEFAULT_CONNECT_TIMEOUT);

        let client = AgentsClient::with_options(
            Some("https://example.com/api".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "https://example.com/api/");
        assert_eq!(client.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn endpoints_resolve_under_base() {
        let client = AgentsClient::new(Some("https://example.com/api/".to_string())).unwrap();
        assert_eq!(
            client.endpoint("sessions/new").unwrap().as_str(),
            "https://example.com/api/sessions/new"
        );
    }

    #[test]
    fn invalid_base_url() {
        let err = AgentsClient::new(Some("not a url".to_string())).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn status_decides_the_error_variant() {
        let err = error_for_status(401, String::new());
        assert!(err.is_authentication());
        assert_eq!(err.status_code(), Some(401));
        assert!(matches!(error_for_status(400, "x".into()), Error::BadRequest { .. }));
        assert!(matches!(error_for_status(422, "x".into()), Error::BadRequest { .. }));
        assert!(matches!(error_for_status(403, "x".into()), Error::Permission { .. }));
        assert!(matches!(error_for_status(404, "x".into()), Error::NotFound { .. }));
        assert!(error_for_status(408, "x".into()).is_timeout());
        assert!(matches!(error_for_status(500, "x".into()), Error::InternalServer { .. }));
        for status in [502, 503, 504] {
            assert!(matches!(
                error_for_status(status, "x".into()),
                Error::ServiceUnavailable { .. }
            ));
        }
        assert_eq!(error_for_status(418, "x".into()).status_code(), Some(418));
    }

    #[test]
    fn error_messages_come_from_detail() {
        assert_eq!(
            error_message(401, r#"{"detail":"Not authenticated"}"#.to_string()),
            "Not authenticated"
        );
        assert_eq!(
            error_message(422, r#"{"detail":[{"msg":"field required"}]}"#.to_string()),
            r#"[{"msg":"field required"}]"#
        );
        assert_eq!(error_message(502, "Bad Gateway".to_string()), "Bad Gateway");
    }

    #[test]
    fn unreadable_body_keeps_the_status() {
        let err = error_for_status(401, error_message(401, String::new()));
        assert!(err.is_authentication());
        assert_eq!(err.to_string(), "Authentication error: HTTP 401");
    }
}
