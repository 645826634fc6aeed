//! Blocking HTTP client with retry for the XC configuration API.
//!
//! Wraps a reqwest blocking client carrying the tenant's `APIToken`
//! authorization header. Transient server errors (502/503/504) and
//! connection failures are retried with exponential backoff before an error
//! is surfaced to the caller.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Error as ReqwestError, Method, StatusCode};
use serde_json::Value;
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

const MAX_ATTEMPTS: u32 = 3;
const RETRIABLE_STATUSES: &[StatusCode] = &[
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) retry_backoff: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            conn_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            timeout,
            conn_timeout,
            retry_backoff,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpResponseError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
    #[error("could not read response body: {0}")]
    ReadingResponse(String),
    #[error("could not build request: {0}")]
    BuildingRequest(String),
    /// A response was received, but had a non-successful status code.
    #[error(
        "unsuccessful response: {status_code} - body: {}",
        String::from_utf8_lossy(body)
    )]
    UnsuccessfulResponse {
        status_code: StatusCode,
        body: Vec<u8>,
    },
    #[error(
        "connection error: could not connect to the host. this is often caused by a \
         firewall, proxy, or network routing issue. original error: {0}"
    )]
    ConnectError(#[source] ReqwestError),
    #[error("timeout error: the request timed out. original error: {0}")]
    TimeoutError(#[source] ReqwestError),
    #[error("generic transport error: {0}")]
    GenericTransportError(#[source] ReqwestError),
}

impl HttpResponseError {
    /// The HTTP status of the response, when one was received at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpResponseError::UnsuccessfulResponse { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

fn from_reqwest_error(e: ReqwestError) -> HttpResponseError {
    if e.is_connect() {
        HttpResponseError::ConnectError(e)
    } else if e.is_timeout() {
        HttpResponseError::TimeoutError(e)
    } else if e.is_builder() || e.is_request() {
        HttpResponseError::BuildingRequest(e.to_string())
    } else {
        HttpResponseError::GenericTransportError(e)
    }
}

/// Thread-safe blocking client; one instance is shared for the whole run.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_backoff: Duration,
}

impl HttpClient {
    /// Builds a reqwest blocking client with the APIToken header installed.
    pub fn new(http_config: HttpConfig, api_token: &str) -> Result<Self, HttpResponseError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("APIToken {api_token}"))
            .map_err(|err| HttpResponseError::ClientBuilder(err.to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(http_config.timeout)
            .connect_timeout(http_config.conn_timeout)
            .build()
            .map_err(|err| HttpResponseError::ClientBuilder(err.to_string()))?;
        Ok(Self {
            client,
            retry_backoff: http_config.retry_backoff,
        })
    }

    /// GET and parse the JSON response. Non-2xx is an error.
    pub fn get_json(&self, url: &str) -> Result<Value, HttpResponseError> {
        debug!("GET {url}");
        let res = self.send_with_retry(Method::GET, url, None)?;
        Self::into_json(Self::require_success(res)?)
    }

    /// POST a JSON body and parse the JSON response. Non-2xx is an error.
    pub fn post_json(&self, url: &str, body: &Value) -> Result<Value, HttpResponseError> {
        debug!("POST {url}");
        let res = self.send_with_retry(Method::POST, url, Some(body))?;
        Self::into_json(Self::require_success(res)?)
    }

    /// DELETE with a JSON body and parse the JSON response. Non-2xx is an error.
    pub fn delete_json(&self, url: &str, body: &Value) -> Result<Value, HttpResponseError> {
        debug!("DELETE {url}");
        let res = self.send_with_retry(Method::DELETE, url, Some(body))?;
        Self::into_json(Self::require_success(res)?)
    }

    /// DELETE with a JSON body, returning the status and raw body text even
    /// for non-2xx responses. The probe-delete path inspects 409 bodies.
    pub fn delete_raw(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<(StatusCode, String), HttpResponseError> {
        debug!("DELETE (raw) {url}");
        let res = self.send_with_retry(Method::DELETE, url, Some(body))?;
        let status = res.status();
        let text = res
            .text()
            .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?;
        Ok((status, text))
    }

    /// Sends the request, retrying on transient failures. Returns the raw
    /// response so callers decide how to interpret non-success statuses.
    fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, HttpResponseError> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                sleep(self.retry_backoff * 2u32.pow(attempt - 1));
            }
            let mut req = self.client.request(method.clone(), url);
            if let Some(body) = body {
                req = req.json(body);
            }
            match req.send() {
                Ok(res) if RETRIABLE_STATUSES.contains(&res.status()) => {
                    debug!(
                        "attempt {} of {MAX_ATTEMPTS}: {url} returned {}",
                        attempt + 1,
                        res.status()
                    );
                    last_err = Some(Self::unsuccessful(res)?);
                }
                Ok(res) => return Ok(res),
                Err(err) if err.is_connect() || err.is_timeout() => {
                    debug!(
                        "attempt {} of {MAX_ATTEMPTS}: {url} transport error: {err}",
                        attempt + 1
                    );
                    last_err = Some(from_reqwest_error(err));
                }
                Err(err) => return Err(from_reqwest_error(err)),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            HttpResponseError::BuildingRequest("no attempt was made".to_string())
        }))
    }

    fn require_success(res: Response) -> Result<Response, HttpResponseError> {
        if res.status().is_success() {
            Ok(res)
        } else {
            Err(Self::unsuccessful(res)?)
        }
    }

    fn unsuccessful(res: Response) -> Result<HttpResponseError, HttpResponseError> {
        let status_code = res.status();
        let body = res
            .bytes()
            .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
            .to_vec();
        Ok(HttpResponseError::UnsuccessfulResponse { status_code, body })
    }

    fn into_json(res: Response) -> Result<Value, HttpResponseError> {
        res.json()
            .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::Method::{DELETE, GET};
    use httpmock::MockServer;
    use serde_json::json;

    fn test_client() -> HttpClient {
        let config = HttpConfig::new(
            Duration::from_secs(3),
            Duration::from_secs(3),
            Duration::from_millis(1),
        );
        HttpClient::new(config, "test-token").unwrap()
    }

    #[test]
    fn get_json_success_carries_auth_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/web/namespaces")
                .header("authorization", "APIToken test-token");
            then.status(200).json_body(json!({"items": []}));
        });

        let client = test_client();
        let value = client.get_json(&server.url("/api/web/namespaces")).unwrap();
        mock.assert();
        assert_eq!(value, json!({"items": []}));
    }

    #[test]
    fn non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not found");
        });

        let client = test_client();
        let err = client.get_json(&server.url("/missing")).unwrap_err();
        assert_matches!(
            err,
            HttpResponseError::UnsuccessfulResponse { status_code, .. }
                if status_code == StatusCode::NOT_FOUND
        );
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn transient_status_is_retried_until_exhaustion() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503).body("unavailable");
        });

        let client = test_client();
        let err = client.get_json(&server.url("/flaky")).unwrap_err();
        assert_eq!(mock.hits(), 3);
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn client_error_status_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/forbidden");
            then.status(403);
        });

        let client = test_client();
        let _ = client.get_json(&server.url("/forbidden")).unwrap_err();
        assert_eq!(mock.hits(), 1);
    }

    #[test]
    fn delete_raw_returns_conflict_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/obj");
            then.status(409).body("{\"message\": \"referenced by ...\"}");
        });

        let client = test_client();
        let (status, body) = client
            .delete_raw(&server.url("/obj"), &json!({"fail_if_referred": true}))
            .unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("referenced by"));
    }
}
