use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::MediaType,
};

/// Result domains that never carry opinions worth reading
const BLOCKLIST: &[&str] = &[
    "reelgood.com",
    "gatsby.tv",
    "moviefone.com",
    "streamin.co",
    "freemoviescinema",
    "teepublic.com",
    "themoviedb.org",
    "imdb.com",
    "justwatch.com",
    "rottentomatoes.com",
    "metacritic.com",
    "simkl.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "tiktok.com",
    "youtube.com",
];

/// One organic web search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WebResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// Web search used to discover review articles and discussions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReviewSearch: Send + Sync {
    /// Critic reviews and opinion pieces
    async fn search_reviews(
        &self,
        title: &str,
        year: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<WebResult>>;

    /// Reddit discussion threads
    async fn search_reddit(
        &self,
        title: &str,
        year: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<WebResult>>;
}

pub fn review_query(title: &str, year: &str, media_type: MediaType) -> String {
    let hint = match media_type {
        MediaType::Tv => "TV series",
        MediaType::Movie => "movie",
    };
    format!("\"{}\" {} {} review opinion", title, year, hint)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn reddit_query(title: &str, year: &str, media_type: MediaType) -> String {
    let hint = match media_type {
        MediaType::Tv => "TV show",
        MediaType::Movie => "movie",
    };
    format!("\"{}\" {} {} reddit", title, year, hint)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_blocked(link: &str) -> bool {
    let link = link.to_lowercase();
    BLOCKLIST.iter().any(|domain| link.contains(domain))
}

/// Serper (Google search) client with a one-way switch to a fallback key
pub struct SerperSearch {
    http_client: HttpClient,
    api_url: String,
    primary_key: String,
    fallback_key: String,
    using_fallback: AtomicBool,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<WebResult>,
}

impl SerperSearch {
    pub fn new(api_url: String, primary_key: String, fallback_key: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            api_url,
            primary_key,
            fallback_key,
            using_fallback: AtomicBool::new(false),
        }
    }

    fn active_key(&self) -> &str {
        if self.using_fallback.load(Ordering::Relaxed) {
            &self.fallback_key
        } else {
            &self.primary_key
        }
    }

    /// Returns false when there is nothing left to switch to
    fn switch_to_fallback(&self) -> bool {
        if self.fallback_key.is_empty() {
            tracing::error!("Primary Serper key exhausted and no fallback key configured");
            return false;
        }
        if self.using_fallback.swap(true, Ordering::Relaxed) {
            tracing::error!("Both Serper keys exhausted");
            return false;
        }
        tracing::warn!("Switched to fallback Serper API key");
        true
    }

    async fn post(&self, query: &str, num: u32) -> AppResult<reqwest::Response> {
        let response = self
            .http_client
            .post(&self.api_url)
            .header("X-API-KEY", self.active_key())
            .json(&json!({ "q": query, "num": num }))
            .send()
            .await?;
        Ok(response)
    }

    /// Runs one search, dropping blocklisted domains
    pub async fn search(&self, query: &str, num: u32) -> AppResult<Vec<WebResult>> {
        let mut response = self.post(query, num).await?;

        if is_exhausted(response.status()) {
            tracing::warn!(status = %response.status(), "Serper key exhausted");
            if !self.switch_to_fallback() {
                return Ok(Vec::new());
            }
            response = self.post(query, num).await?;
            if is_exhausted(response.status()) {
                tracing::error!("Fallback Serper key also exhausted");
                return Ok(Vec::new());
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "Serper returned status {}",
                status
            )));
        }

        let body: SerperResponse = response.json().await?;
        Ok(body
            .organic
            .into_iter()
            .filter(|r| !is_blocked(&r.link))
            .collect())
    }
}

fn is_exhausted(status: StatusCode) -> bool {
    status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait::async_trait]
impl ReviewSearch for SerperSearch {
    async fn search_reviews(
        &self,
        title: &str,
        year: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<WebResult>> {
        self.search(&review_query(title, year, media_type), 20).await
    }

    async fn search_reddit(
        &self,
        title: &str,
        year: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<WebResult>> {
        self.search(&reddit_query(title, year, media_type), 15).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_per_media_type() {
        assert_eq!(
            review_query("Dune", "2021", MediaType::Movie),
            "\"Dune\" 2021 movie review opinion"
        );
        assert_eq!(
            reddit_query("Severance", "", MediaType::Tv),
            "\"Severance\" TV show reddit"
        );
        assert_eq!(
            review_query("Severance", "2022", MediaType::Tv),
            "\"Severance\" 2022 TV series review opinion"
        );
    }

    #[test]
    fn test_blocklist() {
        assert!(is_blocked("https://www.IMDB.com/title/tt1160419/"));
        assert!(!is_blocked("https://www.reddit.com/r/movies/comments/abc"));
    }

    #[test]
    fn test_fallback_switch_happens_once() {
        let serper = SerperSearch::new(
            "http://localhost".to_string(),
            "primary".to_string(),
            "fallback".to_string(),
        );
        assert_eq!(serper.active_key(), "primary");
        assert!(serper.switch_to_fallback());
        assert_eq!(serper.active_key(), "fallback");
        assert!(!serper.switch_to_fallback());
    }

    #[test]
    fn test_no_fallback_configured() {
        let serper = SerperSearch::new(
            "http://localhost".to_string(),
            "primary".to_string(),
            String::new(),
        );
        assert!(!serper.switch_to_fallback());
        assert_eq!(serper.active_key(), "primary");
    }
}
