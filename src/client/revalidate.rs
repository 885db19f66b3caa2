use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::Duration;

use crate::{client::ClientError, models::MediaType};

/// Page path whose cached render shows this title's review
pub fn review_path(media_type: MediaType, tmdb_id: i64) -> String {
    format!("/{}/{}", media_type.as_str(), tmdb_id)
}

/// Asks the frontend to rebuild a page after its review changed
#[async_trait::async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, path: &str) -> Result<(), ClientError>;
}

/// Posts `{"path": ...}` to an on-demand revalidation endpoint
pub struct HttpRevalidator {
    http_client: HttpClient,
    endpoint: String,
    secret: Option<String>,
}

impl HttpRevalidator {
    pub fn new(endpoint: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            endpoint: endpoint.into(),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

#[async_trait::async_trait]
impl Revalidator for HttpRevalidator {
    async fn revalidate(&self, path: &str) -> Result<(), ClientError> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "path": path }))
            .timeout(Duration::from_secs(10));
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        tracing::debug!(path, "Page revalidated");
        Ok(())
    }
}

/// For callers with no cached pages to refresh
pub struct NoopRevalidator;

#[async_trait::async_trait]
impl Revalidator for NoopRevalidator {
    async fn revalidate(&self, _path: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
