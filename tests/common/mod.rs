#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use worth_the_watch::{
    db::MemoryStore,
    error::{AppError, AppResult},
    middleware::RateLimits,
    models::{MediaType, NewMovie},
    routes::{AppState, Providers, Settings},
    services::{
        providers::{ArticleReader, Completion, LanguageModel, MetadataProvider, Prompt, ReviewSearch, WebResult},
        RetryPolicy,
    },
};

/// Canned answer that satisfies both the review and the battle prompt
pub const LLM_ANSWER: &str = r#"{
    "review_text": "Tense, patient and beautifully shot. Most viewers say it holds up.",
    "verdict": "WORTH IT",
    "praise_points": ["The bank heist", "De Niro and Pacino"],
    "criticism_points": ["Runtime"],
    "vibe": "Slow-burn crime epic",
    "positive_pct": 80,
    "negative_pct": 10,
    "mixed_pct": 10,
    "tags": ["crime"],
    "winner": "a",
    "kill_reason": "Sharper in every scene.",
    "breakdown": "Both are great; one is better."
}"#;

pub fn title(tmdb_id: i64, name: &str) -> NewMovie {
    NewMovie {
        tmdb_id,
        title: name.to_string(),
        original_title: None,
        media_type: MediaType::Movie,
        overview: Some(format!("{} overview", name)),
        poster_path: Some("/poster.jpg".to_string()),
        backdrop_path: None,
        genres: vec![],
        release_date: chrono::NaiveDate::from_ymd_opt(1995, 12, 15),
        tmdb_popularity: Some(40.0),
        tmdb_vote_average: Some(8.3),
        tmdb_vote_count: Some(7000),
    }
}

/// TMDB stand-in: every positive id exists and is called "Title {id}"
pub struct FakeMetadata;

#[async_trait::async_trait]
impl MetadataProvider for FakeMetadata {
    async fn search(&self, query: &str) -> AppResult<Vec<NewMovie>> {
        Ok(vec![title(949, query), title(950, &format!("{} 2", query))])
    }

    async fn details(&self, tmdb_id: i64, _media_type: MediaType) -> AppResult<NewMovie> {
        if tmdb_id >= 900_000 {
            return Err(AppError::NotFound(format!("Title {} not found on TMDB", tmdb_id)));
        }
        Ok(title(tmdb_id, &format!("Title {}", tmdb_id)))
    }
}

pub struct FakeSearch;

#[async_trait::async_trait]
impl ReviewSearch for FakeSearch {
    async fn search_reviews(
        &self,
        title: &str,
        _year: &str,
        _media_type: MediaType,
    ) -> AppResult<Vec<WebResult>> {
        Ok((1..=3)
            .map(|i| WebResult {
                title: format!("{} review {}", title, i),
                link: format!("https://critics{}.example.com/review", i),
                snippet: "A gripping, well acted film worth your evening.".to_string(),
            })
            .collect())
    }

    async fn search_reddit(
        &self,
        title: &str,
        _year: &str,
        _media_type: MediaType,
    ) -> AppResult<Vec<WebResult>> {
        Ok(vec![WebResult {
            title: format!("{} discussion", title),
            link: "https://www.reddit.com/r/movies/comments/abc/discussion/".to_string(),
            snippet: "I loved it, the tension never lets up.".to_string(),
        }])
    }
}

pub struct FakeReader;

#[async_trait::async_trait]
impl ArticleReader for FakeReader {
    async fn read(&self, url: &str) -> Option<String> {
        Some(format!(
            "Review from {}.\n\nI think the performances are excellent and the pacing is deliberate. \
             The heist sequence is one of the best ever filmed and I would recommend it to anyone.\n\n\
             Some found the runtime too long, but the story earns every minute of it overall.",
            url
        ))
    }
}

pub struct FakeModel;

#[async_trait::async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, _prompt: &Prompt) -> AppResult<Completion> {
        Ok(Completion {
            content: LLM_ANSWER.to_string(),
            model: "fake-model".to_string(),
        })
    }
}

pub fn providers() -> Providers {
    Providers {
        metadata: Arc::new(FakeMetadata),
        search: Arc::new(FakeSearch),
        reader: Arc::new(FakeReader),
        llm: Arc::new(FakeModel),
    }
}

pub fn settings() -> Settings {
    Settings {
        limits: RateLimits {
            per_ip_per_hour: 100,
            per_ip_per_day: 100,
            daily_generations: 100,
        },
        watchlist_max_items: 100,
        ip_hash_salt: "test-salt".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        retry: RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
        },
    }
}

pub fn app_state(store: MemoryStore, settings: Settings) -> AppState {
    AppState::new(Arc::new(store), providers(), settings)
}
