use crate::{
    error::AppResult,
    models::{
        AddWatchlistRequest, BattleResult, Movie, MovieListQuery, MovieWithReview, NewMovie,
        PaginatedMovies, Review, ReviewDraft, WatchlistEntry,
    },
};

/// Persistence for movies, their reviews and search analytics
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    /// Looks up a movie by TMDB id, with its review when one exists
    async fn find_movie(&self, tmdb_id: i64) -> AppResult<Option<MovieWithReview>>;

    /// Inserts a movie or refreshes the metadata of an existing one.
    ///
    /// Idempotent on `tmdb_id`: concurrent callers end up with the same row.
    async fn save_movie(&self, movie: NewMovie) -> AppResult<Movie>;

    /// Stores the review for a movie, replacing any previous one
    async fn save_review(&self, movie_id: i64, draft: ReviewDraft) -> AppResult<Review>;

    /// Case-insensitive title substring search over stored movies
    async fn search_movies(&self, query: &str, limit: i64) -> AppResult<Vec<MovieWithReview>>;

    /// One page of a browse section
    async fn list_movies(&self, query: MovieListQuery) -> AppResult<PaginatedMovies>;

    /// Records a search for analytics
    async fn record_search(&self, query: &str, ip_hash: &str) -> AppResult<()>;
}

/// Cache of AI-judged battles, keyed by unordered pair
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BattleStore: Send + Sync {
    async fn find_battle(&self, a: i64, b: i64) -> AppResult<Option<BattleResult>>;

    async fn save_battle(&self, result: &BattleResult, llm_model: Option<String>) -> AppResult<()>;
}

/// Per-user saved titles
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Entries for a user, most recently added first
    async fn list_entries(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>>;

    /// Inserts the entry or updates it in place on (user, tmdb_id) conflict.
    ///
    /// A new title is only inserted while the user holds fewer than
    /// `max_items` entries; `None` means the list is full. The check and the
    /// write are atomic per user. The original `added_at` survives an update.
    async fn upsert_entry(
        &self,
        user_id: &str,
        entry: AddWatchlistRequest,
        max_items: i64,
    ) -> AppResult<Option<WatchlistEntry>>;

    /// Returns whether an entry was removed
    async fn remove_entry(&self, user_id: &str, tmdb_id: i64) -> AppResult<bool>;
}
