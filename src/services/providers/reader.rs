use futures::{stream, StreamExt};
use reqwest::Client as HttpClient;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Social and video sites with nothing a text reader can use
const SKIP_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "twitter.com",
    "x.com",
    "instagram.com",
    "tiktok.com",
    "facebook.com",
];

/// Sites that block readers or sit behind paywalls
const BLOCKED_DOMAINS: &[&str] = &[
    "imdb.com",
    "rottentomatoes.com",
    "letterboxd.com",
    "rogerebert.com",
    "nytimes.com",
    "wsj.com",
    "washingtonpost.com",
    "bloomberg.com",
    "newyorker.com",
    "wired.com",
];

/// Bodies this short are error pages or consent walls
const MIN_ARTICLE_CHARS: usize = 100;

pub const MAX_CONCURRENT_READS: usize = 10;

/// Whether a URL points at a site the reader should not bother with
pub fn is_unreadable(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    SKIP_DOMAINS
        .iter()
        .chain(BLOCKED_DOMAINS.iter())
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Fetches article bodies as plain text
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArticleReader: Send + Sync {
    /// Returns `None` when the page could not be read
    async fn read(&self, url: &str) -> Option<String>;
}

/// Reads many URLs with bounded concurrency, keeping input order
pub async fn read_many(reader: &dyn ArticleReader, urls: &[String]) -> Vec<String> {
    // Built eagerly so the returned future stays `Send`
    let reads: Vec<_> = urls.iter().map(|url| reader.read(url)).collect();
    let articles: Vec<String> = stream::iter(reads)
        .buffered(MAX_CONCURRENT_READS)
        .collect::<Vec<Option<String>>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    tracing::info!(read = articles.len(), requested = urls.len(), "Read articles");
    articles
}

/// Jina Reader: renders any page to markdown through `<base>/<url>`
pub struct JinaReader {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl JinaReader {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(Duration::from_secs(8))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
        }
    }

    async fn fetch(&self, url: &str) -> AppResult<String> {
        let mut request = self
            .http_client
            .get(format!("{}/{}", self.base_url.trim_end_matches('/'), url))
            .header("Accept", "text/plain");
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Reader returned status {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl ArticleReader for JinaReader {
    async fn read(&self, url: &str) -> Option<String> {
        if is_unreadable(url) {
            tracing::debug!(url, "Skipping unreadable domain");
            return None;
        }

        match self.fetch(url).await {
            Ok(body) if body.trim().len() > MIN_ARTICLE_CHARS => Some(body),
            Ok(_) => {
                tracing::debug!(url, "Article body too short");
                None
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "Failed to read article");
                None
            }
        }
    }
}
