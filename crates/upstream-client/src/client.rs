use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, Error as BackoffError, ExponentialBackoff};
use reqwest::{header, Client, StatusCode};
use tracing::{instrument, warn};

use crate::error::UpstreamError;
use crate::model::{Page, ReferenceItem, Statistics, UpstreamDocument, UpstreamDocumentMetadata};

/// Credentials accepted by the upstream backend.
#[derive(Debug, Clone)]
pub enum AuthMode {
    Bearer(String),
    Basic { username: String, password: String },
}

/// Configuration for [`ReqwestUpstreamClient`].
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub base_url: String,
    pub auth: AuthMode,
    /// Per-call timeout (default 30s).
    pub timeout: Duration,
    /// Overall wall-clock cap across retries for a single logical call
    /// (default 30s, per the spec's "exponential backoff capped at 30s").
    pub max_elapsed: Duration,
    /// Upper bound honoured for a `Retry-After` value on HTTP 429.
    pub max_retry_after: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: AuthMode::Bearer(String::new()),
            timeout: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(30),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

/// The typed interface over the upstream document backend's JSON API.
/// Abstracted as a trait so sync can be tested against [`crate::mock::MockUpstreamClient`]
/// without a live server.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn get_statistics(&self) -> Result<Statistics, UpstreamError>;
    async fn list_documents(&self, page: u32, page_size: u32) -> Result<Page<UpstreamDocument>, UpstreamError>;
    async fn get_document(&self, id: i64) -> Result<UpstreamDocument, UpstreamError>;
    async fn get_document_metadata(&self, id: i64) -> Result<UpstreamDocumentMetadata, UpstreamError>;
    async fn list_tags(&self) -> Result<Vec<ReferenceItem>, UpstreamError>;
    async fn list_correspondents(&self) -> Result<Vec<ReferenceItem>, UpstreamError>;
    async fn list_document_types(&self) -> Result<Vec<ReferenceItem>, UpstreamError>;
    async fn delete_document(&self, id: i64) -> Result<(), UpstreamError>;
}

/// Production [`UpstreamClient`] backed by `reqwest`, with exponential
/// backoff + jitter on transient failures.
pub struct ReqwestUpstreamClient {
    http: Client,
    config: UpstreamClientConfig,
}

impl ReqwestUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, UpstreamError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json; version=9"),
        );
        match &config.auth {
            AuthMode::Bearer(token) => {
                let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| UpstreamError::Protocol(e.to_string()))?;
                headers.insert(header::AUTHORIZATION, value);
            }
            AuthMode::Basic { .. } => {
                // Basic auth is applied per-request via `.basic_auth`, not a static header.
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.get(url);
        match &self.config.auth {
            AuthMode::Basic { username, password } => builder.basic_auth(username, Some(password)),
            AuthMode::Bearer(_) => builder,
        }
    }

    /// Execute `f` (one HTTP call) with exponential backoff, honouring
    /// `Retry-After` on 429 and classifying auth/4xx failures as
    /// non-retriable per §7.
    #[instrument(skip(self, f))]
    async fn with_retry<T, F, Fut>(&self, f: F) -> Result<T, UpstreamError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, UpstreamError>>,
    {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.config.max_elapsed),
            ..ExponentialBackoff::default()
        };

        retry(backoff, || async {
            match f().await {
                Ok(v) => Ok(v),
                Err(e @ UpstreamError::Auth(_)) => Err(BackoffError::permanent(e)),
                Err(e @ UpstreamError::ClientError { .. }) => Err(BackoffError::permanent(e)),
                Err(UpstreamError::RateLimited { retry_after, body }) => {
                    warn!(?retry_after, "rate limited by upstream, honoring Retry-After");
                    Err(BackoffError::Transient {
                        err: UpstreamError::RateLimited { retry_after, body },
                        retry_after: Some(retry_after),
                    })
                }
                Err(e) => {
                    warn!(error = %e, "transient upstream failure, retrying");
                    Err(BackoffError::transient(e))
                }
            }
        })
        .await
    }

    async fn classify_response(
        resp: reqwest::Response,
        max_retry_after: Duration,
    ) -> Result<reqwest::Response, UpstreamError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Auth(format!("status {status}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(resp.headers(), max_retry_after);
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::RateLimited { retry_after, body });
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Unavailable(format!("status {status}: {body}")));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(UpstreamError::ClientError {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, UpstreamError> {
        self.with_retry(|| {
            let url = url.clone();
            async move {
                let resp = self
                    .request(&url)
                    .send()
                    .await
                    .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
                let resp = Self::classify_response(resp, self.config.max_retry_after).await?;
                resp.json::<T>().await.map_err(|e| UpstreamError::Protocol(e.to_string()))
            }
        })
        .await
    }

    /// Fetch every page of a paginated collection, following `next` until
    /// it is exhausted (§6 marks the reference tables "paginated").
    async fn get_all_pages<T: serde::de::DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>, UpstreamError> {
        let mut results = Vec::new();
        let mut next_url = Some(first_url);
        while let Some(url) = next_url {
            let page: Page<T> = self.get_json(url).await?;
            results.extend(page.results);
            next_url = page.next;
        }
        Ok(results)
    }
}

/// Parse the `Retry-After` header (delta-seconds or an HTTP-date), clamped
/// to `max`. Falls back to `max` if the header is absent or unparseable.
fn parse_retry_after(headers: &header::HeaderMap, max: Duration) -> Duration {
    let Some(value) = headers.get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()) else {
        return max;
    };
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(max);
    }
    if let Ok(when) = chrono::DateTime::parse_from_rfc2822(value) {
        let wait = (when.with_timezone(&chrono::Utc) - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        return wait.min(max);
    }
    max
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn get_statistics(&self) -> Result<Statistics, UpstreamError> {
        self.get_json(self.url("/api/statistics/")).await
    }

    async fn list_documents(&self, page: u32, page_size: u32) -> Result<Page<UpstreamDocument>, UpstreamError> {
        let url = self.url(&format!(
            "/api/documents/?page={page}&page_size={page_size}&ordering=-modified"
        ));
        self.get_json(url).await
    }

    async fn get_document(&self, id: i64) -> Result<UpstreamDocument, UpstreamError> {
        self.get_json(self.url(&format!("/api/documents/{id}/"))).await
    }

    async fn get_document_metadata(&self, id: i64) -> Result<UpstreamDocumentMetadata, UpstreamError> {
        self.get_json(self.url(&format!("/api/documents/{id}/metadata/"))).await
    }

    async fn list_tags(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        self.get_all_pages(self.url("/api/tags/")).await
    }

    async fn list_correspondents(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        self.get_all_pages(self.url("/api/correspondents/")).await
    }

    async fn list_document_types(&self) -> Result<Vec<ReferenceItem>, UpstreamError> {
        self.get_all_pages(self.url("/api/document_types/")).await
    }

    async fn delete_document(&self, id: i64) -> Result<(), UpstreamError> {
        self.with_retry(|| async {
            let resp = self
                .http
                .delete(self.url(&format!("/api/documents/{id}/")))
                .send()
                .await
                .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
            Self::classify_response(resp, self.config.max_retry_after).await.map(|_| ())
        })
        .await
    }
}
