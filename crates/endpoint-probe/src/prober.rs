//! HTTP prober

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ProbeError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// What the endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// `None` when the body could not be read
    pub body: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Media type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
    }
}

#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

/// Prober over a dedicated `reqwest` client.
pub struct HttpProber {
    client: reqwest::Client,
    total_timeout: Duration,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_TOTAL_TIMEOUT)
    }

    pub fn with_timeouts(connect: Duration, total: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(total)
            .user_agent(concat!("console-pilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ProbeError::Unreachable(format!("http client: {err}")))?;
        Ok(Self {
            client,
            total_timeout: total,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.total_timeout.as_millis() as u64)
        } else {
            ProbeError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let parsed = reqwest::Url::parse(url).map_err(|err| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        debug!(url, "probing endpoint");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = match response.text().await {
            Ok(text) => Some(text),
            Err(err) if err.is_timeout() => return Err(self.classify(err)),
            Err(err) => {
                warn!(url, error = %err, "probe body unreadable");
                None
            }
        };

        info!(url, status, content_type = content_type.as_deref().unwrap_or("-"), "probe answered");
        Ok(ProbeResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn returns_status_type_and_body() {
        let base = serve(Router::new().route(
            "/.well-known/assetlinks.json",
            get(|| async { ([("content-type", "application/json")], "[]") }),
        ))
        .await;
        let prober = HttpProber::new().unwrap();
        let response = prober
            .probe(&format!("{base}/.well-known/assetlinks.json"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.media_type().as_deref(), Some("application/json"));
        assert_eq!(response.body.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn non_2xx_is_a_response_not_an_error() {
        let base = serve(Router::new().route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "nope") }),
        ))
        .await;
        let response = HttpProber::new()
            .unwrap()
            .probe(&format!("{base}/missing"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let prober =
            HttpProber::with_timeouts(Duration::from_secs(1), Duration::from_millis(200)).unwrap();
        let err = prober.probe(&format!("{base}/slow")).await.unwrap_err();
        assert_eq!(err, ProbeError::Timeout(200));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = HttpProber::new()
            .unwrap()
            .probe(&format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable(_)));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let prober = HttpProber::new().unwrap();
        assert!(matches!(
            prober.probe("ftp://androidnews.app/x").await,
            Err(ProbeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            prober.probe("not a url").await,
            Err(ProbeError::InvalidUrl { .. })
        ));
    }
}
