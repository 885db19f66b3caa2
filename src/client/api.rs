use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use crate::models::{GenerationMode, GenerationUpdate, MediaType, StartResponse};

/// Failures seen by the status client
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    RateLimited(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("This title hasn't been released yet")]
    Unreleased,

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Generation is taking too long. Check back in a bit.")]
    Timeout,

    #[error("{0}")]
    Generation(String),
}

impl ClientError {
    /// Connection-level failures the tracker recovers from by polling
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed wrapper around the generation endpoints
#[derive(Clone)]
pub struct ReviewApi {
    http_client: HttpClient,
    base_url: String,
}

impl ReviewApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(HttpClient::new(), base_url)
    }

    pub fn with_client(http_client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn start(
        &self,
        tmdb_id: i64,
        media_type: MediaType,
        mode: GenerationMode,
    ) -> Result<StartResponse, ClientError> {
        let action = match mode {
            GenerationMode::Fresh => "generate",
            GenerationMode::Regenerate => "regenerate",
        };
        let url = format!("{}/api/search/{}/{}", self.base_url, action, tmdb_id);
        let response = self
            .http_client
            .post(url)
            .query(&[("media_type", media_type.as_str())])
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        decode(check(response).await?).await
    }

    pub async fn status(&self, tmdb_id: i64) -> Result<GenerationUpdate, ClientError> {
        let url = format!("{}/api/search/status/{}", self.base_url, tmdb_id);
        let response = self
            .http_client
            .get(url)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;
        decode(check(response).await?).await
    }

    /// Opens the SSE stream; the body is read by the caller
    pub async fn open_stream(&self, tmdb_id: i64) -> Result<Response, ClientError> {
        let url = format!("{}/api/search/stream/{}", self.base_url, tmdb_id);
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check(response).await?;

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if !is_event_stream {
            return Err(ClientError::Decode(
                "stream endpoint did not return text/event-stream".to_string(),
            ));
        }
        Ok(response)
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        });

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ClientError::RateLimited(message));
    }
    Err(ClientError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}
