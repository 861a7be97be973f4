use std::error::Error as _;
use std::time::Duration;

use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::models::HttpMethod;
use crate::validation::MAX_TIMEOUT_SECONDS;

/// A single outbound request derived from a check
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: HttpMethod,
    pub url: Url,
}

/// What the prober observed before the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Performs one network probe
///
/// Implementations must be cancel-safe: the executor drops the returned
/// future once the check's timeout elapses.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError>;
}

/// HTTP/HTTPS prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        // Redirects are not followed: the first response is the one classified
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(MAX_TIMEOUT_SECONDS))
            .user_agent(concat!("upwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .request(request.method.into(), request.url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        Ok(ProbeResponse { status_code: response.status().as_u16() })
    }
}

fn classify_error(error: reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout
    } else if error.is_connect() {
        ProbeError::Connect(error_chain(&error))
    } else {
        ProbeError::Request(error_chain(&error))
    }
}

/// reqwest's top-level message is generic, the cause is in the source chain
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: HttpMethod, url: &str) -> ProbeRequest {
        ProbeRequest { method, url: Url::parse(url).unwrap() }
    }

    #[tokio::test]
    async fn test_reports_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let prober = HttpProber::new().unwrap();
        let response = prober
            .probe(&request(HttpMethod::Post, &format!("{}/health", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, 503);
    }

    #[tokio::test]
    async fn test_does_not_follow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let prober = HttpProber::new().unwrap();
        let response =
            prober.probe(&request(HttpMethod::Get, &format!("{}/old", server.uri()))).await.unwrap();

        assert_eq!(response.status_code, 301);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = HttpProber::new().unwrap();
        let err = prober
            .probe(&request(HttpMethod::Get, &format!("http://127.0.0.1:{port}/")))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Connect(_)), "unexpected error: {err}");
    }
}
