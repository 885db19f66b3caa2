use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    db::store::{BattleStore, MovieStore, WatchlistStore},
    error::AppResult,
    models::{
        AddWatchlistRequest, BattleResult, Confidence, MediaType, Movie, MovieCategory,
        MovieListQuery, MovieWithReview, NewMovie, PaginatedMovies, Review, ReviewDraft, Verdict,
        WatchlistEntry, HIDDEN_GEM_POPULARITY,
    },
};

/// In-process store used for `memory://` deployments and tests
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    next_id: i64,
    /// Keyed by TMDB id
    movies: HashMap<i64, Movie>,
    /// Keyed by internal movie id
    reviews: HashMap<i64, Review>,
    searches: Vec<(String, String)>,
    battles: HashMap<(i64, i64), (BattleResult, Option<String>)>,
    watchlists: HashMap<String, Vec<WatchlistEntry>>,
}

impl MemoryStoreInner {
    fn with_review(&self, movie: &Movie) -> MovieWithReview {
        MovieWithReview {
            movie: movie.clone(),
            review: self.reviews.get(&movie.id).cloned(),
        }
    }

    fn matches(&self, movie: &Movie, category: MovieCategory) -> bool {
        let review = self.reviews.get(&movie.id);
        let verdict = review.map(|r| r.verdict);
        match category {
            MovieCategory::Trending => true,
            MovieCategory::Latest => review.is_some(),
            MovieCategory::WorthIt => verdict == Some(Verdict::WorthIt),
            MovieCategory::SkipThese => verdict == Some(Verdict::NotWorthIt),
            MovieCategory::MixedBag => verdict == Some(Verdict::MixedBag),
            MovieCategory::HiddenGems => review.is_some_and(|r| {
                r.verdict == Verdict::WorthIt
                    && r.confidence == Confidence::High
                    && movie
                        .tmdb_popularity
                        .is_some_and(|p| p < HIDDEN_GEM_POPULARITY)
            }),
            MovieCategory::Movies => movie.media_type == MediaType::Movie,
            MovieCategory::TvShows => movie.media_type == MediaType::Tv,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded search events
    pub async fn search_count(&self) -> usize {
        self.inner.read().await.searches.len()
    }
}

#[async_trait::async_trait]
impl MovieStore for MemoryStore {
    async fn find_movie(&self, tmdb_id: i64) -> AppResult<Option<MovieWithReview>> {
        let inner = self.inner.read().await;
        Ok(inner.movies.get(&tmdb_id).map(|m| inner.with_review(m)))
    }

    async fn save_movie(&self, movie: NewMovie) -> AppResult<Movie> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let existing = inner
            .movies
            .get(&movie.tmdb_id)
            .map(|m| (m.id, m.created_at));
        let saved = match existing {
            Some((id, created_at)) => {
                let mut updated = Movie::from_new(id, movie, created_at);
                updated.updated_at = now;
                updated
            }
            None => {
                inner.next_id += 1;
                Movie::from_new(inner.next_id, movie, now)
            }
        };

        inner.movies.insert(saved.tmdb_id, saved.clone());
        Ok(saved)
    }

    async fn save_review(&self, movie_id: i64, draft: ReviewDraft) -> AppResult<Review> {
        let review = draft.into_review(Utc::now());
        self.inner
            .write()
            .await
            .reviews
            .insert(movie_id, review.clone());
        Ok(review)
    }

    async fn search_movies(&self, query: &str, limit: i64) -> AppResult<Vec<MovieWithReview>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;

        let mut found: Vec<&Movie> = inner
            .movies
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| {
            b.tmdb_popularity
                .unwrap_or(0.0)
                .total_cmp(&a.tmdb_popularity.unwrap_or(0.0))
        });

        Ok(found
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|m| inner.with_review(m))
            .collect())
    }

    async fn list_movies(&self, query: MovieListQuery) -> AppResult<PaginatedMovies> {
        let inner = self.inner.read().await;

        let mut matching: Vec<&Movie> = inner
            .movies
            .values()
            .filter(|m| inner.matches(m, query.category))
            .collect();

        match query.category {
            MovieCategory::Trending => matching.sort_by(|a, b| {
                b.tmdb_popularity
                    .unwrap_or(0.0)
                    .total_cmp(&a.tmdb_popularity.unwrap_or(0.0))
            }),
            MovieCategory::Movies | MovieCategory::TvShows => {
                matching.sort_by(|a, b| b.release_date.cmp(&a.release_date))
            }
            _ => matching.sort_by_key(|m| {
                std::cmp::Reverse(inner.reviews.get(&m.id).map(|r| r.generated_at))
            }),
        }

        let total = matching.len() as i64;
        let movies = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|m| inner.with_review(m))
            .collect();

        Ok(PaginatedMovies {
            movies,
            total,
            page: query.page,
            pages: query.pages_for(total),
        })
    }

    async fn record_search(&self, query: &str, ip_hash: &str) -> AppResult<()> {
        self.inner
            .write()
            .await
            .searches
            .push((query.to_string(), ip_hash.to_string()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl BattleStore for MemoryStore {
    async fn find_battle(&self, a: i64, b: i64) -> AppResult<Option<BattleResult>> {
        let key = BattleResult::pair_key(a, b);
        Ok(self
            .inner
            .read()
            .await
            .battles
            .get(&key)
            .map(|(result, _)| result.clone()))
    }

    async fn save_battle(&self, result: &BattleResult, llm_model: Option<String>) -> AppResult<()> {
        let key = BattleResult::pair_key(result.movie_a.tmdb_id, result.movie_b.tmdb_id);
        self.inner
            .write()
            .await
            .battles
            .insert(key, (result.clone(), llm_model));
        Ok(())
    }
}

#[async_trait::async_trait]
impl WatchlistStore for MemoryStore {
    async fn list_entries(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        let inner = self.inner.read().await;
        let mut entries = inner.watchlists.get(user_id).cloned().unwrap_or_default();
        // Later inserts win ties on identical timestamps
        entries.reverse();
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(entries)
    }

    async fn upsert_entry(
        &self,
        user_id: &str,
        entry: AddWatchlistRequest,
        max_items: i64,
    ) -> AppResult<Option<WatchlistEntry>> {
        let mut inner = self.inner.write().await;
        let entries = inner.watchlists.entry(user_id.to_string()).or_default();

        if let Some(existing) = entries.iter_mut().find(|e| e.tmdb_id == entry.tmdb_id) {
            existing.media_type = entry.media_type;
            existing.title = entry.title.trim().to_string();
            if entry.poster_path.is_some() {
                existing.poster_path = entry.poster_path;
            }
            return Ok(Some(existing.clone()));
        }

        if entries.len() as i64 >= max_items {
            return Ok(None);
        }

        let added = WatchlistEntry {
            tmdb_id: entry.tmdb_id,
            media_type: entry.media_type,
            title: entry.title.trim().to_string(),
            poster_path: entry.poster_path,
            added_at: Utc::now(),
        };
        entries.push(added.clone());
        Ok(Some(added))
    }

    async fn remove_entry(&self, user_id: &str, tmdb_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(entries) = inner.watchlists.get_mut(user_id) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| e.tmdb_id != tmdb_id);
        Ok(entries.len() < before)
    }
}
