use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

use crate::{
    db::store::{BattleStore, MovieStore, WatchlistStore},
    error::{AppError, AppResult},
    models::{
        AddWatchlistRequest, BattleResult, Confidence, Genre, MediaType, Movie, MovieCategory,
        MovieListQuery, MovieWithReview, NewMovie, PaginatedMovies, Review, ReviewDraft, Verdict,
        WatchlistEntry, HIDDEN_GEM_POPULARITY,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const MOVIE_COLUMNS: &str = "m.id, m.tmdb_id, m.title, m.original_title, m.media_type, \
    m.overview, m.poster_path, m.backdrop_path, m.genres, m.release_date, m.tmdb_popularity, \
    m.tmdb_vote_average, m.tmdb_vote_count, m.created_at, m.updated_at";

const REVIEW_COLUMNS: &str = "movie_id, verdict, review_text, praise_points, criticism_points, \
    vibe, confidence, sources_count, sources_urls, llm_model, generated_at, imdb_score, \
    rt_critic_score, rt_audience_score, controversial, positive_pct, negative_pct, mixed_pct, tags";

#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    tmdb_id: i64,
    title: String,
    original_title: Option<String>,
    media_type: String,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    genres: Json<Vec<Genre>>,
    release_date: Option<NaiveDate>,
    tmdb_popularity: Option<f64>,
    tmdb_vote_average: Option<f64>,
    tmdb_vote_count: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = AppError;

    fn try_from(row: MovieRow) -> AppResult<Self> {
        let media_type: MediaType = row.media_type.parse().map_err(AppError::Internal)?;
        let new = NewMovie {
            tmdb_id: row.tmdb_id,
            title: row.title,
            original_title: row.original_title,
            media_type,
            overview: row.overview,
            poster_path: row.poster_path,
            backdrop_path: row.backdrop_path,
            genres: row.genres.0,
            release_date: row.release_date,
            tmdb_popularity: row.tmdb_popularity,
            tmdb_vote_average: row.tmdb_vote_average,
            tmdb_vote_count: row.tmdb_vote_count,
        };
        let mut movie = Movie::from_new(row.id, new, row.created_at);
        movie.updated_at = row.updated_at;
        Ok(movie)
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    movie_id: i64,
    verdict: String,
    review_text: String,
    praise_points: Option<Json<Vec<String>>>,
    criticism_points: Option<Json<Vec<String>>>,
    vibe: Option<String>,
    confidence: String,
    sources_count: i32,
    sources_urls: Option<Json<Vec<String>>>,
    llm_model: Option<String>,
    generated_at: DateTime<Utc>,
    imdb_score: Option<f64>,
    rt_critic_score: Option<i32>,
    rt_audience_score: Option<i32>,
    controversial: bool,
    positive_pct: Option<i32>,
    negative_pct: Option<i32>,
    mixed_pct: Option<i32>,
    tags: Json<Vec<String>>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> AppResult<Self> {
        let verdict: Verdict = row.verdict.parse().map_err(AppError::Internal)?;
        let confidence: Confidence = row.confidence.parse().map_err(AppError::Internal)?;
        Ok(Review {
            verdict,
            review_text: row.review_text,
            praise_points: row.praise_points.map(|j| j.0).unwrap_or_default(),
            criticism_points: row.criticism_points.map(|j| j.0).unwrap_or_default(),
            vibe: row.vibe,
            confidence,
            sources_count: row.sources_count,
            sources_urls: row.sources_urls.map(|j| j.0).unwrap_or_default(),
            llm_model: row.llm_model,
            generated_at: row.generated_at,
            imdb_score: row.imdb_score,
            rt_critic_score: row.rt_critic_score,
            rt_audience_score: row.rt_audience_score,
            controversial: row.controversial,
            positive_pct: row.positive_pct,
            negative_pct: row.negative_pct,
            mixed_pct: row.mixed_pct,
            tags: row.tags.0,
        })
    }
}

#[derive(Debug, FromRow)]
struct WatchlistRow {
    tmdb_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    added_at: DateTime<Utc>,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = AppError;

    fn try_from(row: WatchlistRow) -> AppResult<Self> {
        Ok(WatchlistEntry {
            tmdb_id: row.tmdb_id,
            media_type: row.media_type.parse().map_err(AppError::Internal)?,
            title: row.title,
            poster_path: row.poster_path,
            added_at: row.added_at,
        })
    }
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Postgres-backed implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads reviews for the given movies in one query and pairs them up
    async fn attach_reviews(&self, movies: Vec<Movie>) -> AppResult<Vec<MovieWithReview>> {
        if movies.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE movie_id = ANY($1)",
            REVIEW_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut reviews = HashMap::with_capacity(rows.len());
        for row in rows {
            let movie_id = row.movie_id;
            reviews.insert(movie_id, Review::try_from(row)?);
        }

        Ok(movies
            .into_iter()
            .map(|movie| {
                let review = reviews.remove(&movie.id);
                MovieWithReview { movie, review }
            })
            .collect())
    }

    /// Pushes the FROM/JOIN/WHERE part shared by the listing and count queries
    fn push_category_filter(qb: &mut QueryBuilder<'_, Postgres>, category: MovieCategory) {
        qb.push(" FROM movies m");
        match category {
            MovieCategory::Trending => {}
            MovieCategory::Latest => {
                qb.push(" JOIN reviews r ON r.movie_id = m.id");
            }
            MovieCategory::WorthIt | MovieCategory::SkipThese | MovieCategory::MixedBag => {
                let verdict = match category {
                    MovieCategory::WorthIt => Verdict::WorthIt,
                    MovieCategory::SkipThese => Verdict::NotWorthIt,
                    _ => Verdict::MixedBag,
                };
                qb.push(" JOIN reviews r ON r.movie_id = m.id WHERE r.verdict = ");
                qb.push_bind(verdict.as_str());
            }
            MovieCategory::HiddenGems => {
                qb.push(" JOIN reviews r ON r.movie_id = m.id WHERE r.verdict = ");
                qb.push_bind(Verdict::WorthIt.as_str());
                qb.push(" AND r.confidence = ");
                qb.push_bind(Confidence::High.as_str());
                qb.push(" AND m.tmdb_popularity < ");
                qb.push_bind(HIDDEN_GEM_POPULARITY);
            }
            MovieCategory::Movies | MovieCategory::TvShows => {
                let media_type = if category == MovieCategory::Movies {
                    MediaType::Movie
                } else {
                    MediaType::Tv
                };
                qb.push(" WHERE m.media_type = ");
                qb.push_bind(media_type.as_str());
            }
        }
    }

    fn order_clause(category: MovieCategory) -> &'static str {
        match category {
            MovieCategory::Trending => " ORDER BY m.tmdb_popularity DESC NULLS LAST",
            MovieCategory::Movies | MovieCategory::TvShows => {
                " ORDER BY m.release_date DESC NULLS LAST"
            }
            _ => " ORDER BY r.generated_at DESC",
        }
    }
}

#[async_trait::async_trait]
impl MovieStore for PgStore {
    async fn find_movie(&self, tmdb_id: i64) -> AppResult<Option<MovieWithReview>> {
        let row: Option<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies m WHERE m.tmdb_id = $1",
            MOVIE_COLUMNS
        ))
        .bind(tmdb_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let movie = Movie::try_from(row)?;
                Ok(self.attach_reviews(vec![movie]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn save_movie(&self, movie: NewMovie) -> AppResult<Movie> {
        let row: MovieRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO movies AS m (tmdb_id, title, original_title, media_type, overview,
                poster_path, backdrop_path, genres, release_date, tmdb_popularity,
                tmdb_vote_average, tmdb_vote_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tmdb_id) DO UPDATE SET
                title = EXCLUDED.title,
                original_title = EXCLUDED.original_title,
                media_type = EXCLUDED.media_type,
                overview = EXCLUDED.overview,
                poster_path = EXCLUDED.poster_path,
                backdrop_path = EXCLUDED.backdrop_path,
                genres = EXCLUDED.genres,
                release_date = EXCLUDED.release_date,
                tmdb_popularity = EXCLUDED.tmdb_popularity,
                tmdb_vote_average = EXCLUDED.tmdb_vote_average,
                tmdb_vote_count = EXCLUDED.tmdb_vote_count,
                updated_at = now()
            RETURNING {}
            "#,
            MOVIE_COLUMNS
        ))
        .bind(movie.tmdb_id)
        .bind(&movie.title)
        .bind(&movie.original_title)
        .bind(movie.media_type.as_str())
        .bind(&movie.overview)
        .bind(&movie.poster_path)
        .bind(&movie.backdrop_path)
        .bind(Json(&movie.genres))
        .bind(movie.release_date)
        .bind(movie.tmdb_popularity)
        .bind(movie.tmdb_vote_average)
        .bind(movie.tmdb_vote_count)
        .fetch_one(&self.pool)
        .await?;

        Movie::try_from(row)
    }

    async fn save_review(&self, movie_id: i64, draft: ReviewDraft) -> AppResult<Review> {
        let review = draft.into_review(Utc::now());

        let row: ReviewRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reviews (movie_id, verdict, review_text, praise_points, criticism_points,
                vibe, confidence, sources_count, sources_urls, llm_model, generated_at,
                controversial, positive_pct, negative_pct, mixed_pct, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (movie_id) DO UPDATE SET
                verdict = EXCLUDED.verdict,
                review_text = EXCLUDED.review_text,
                praise_points = EXCLUDED.praise_points,
                criticism_points = EXCLUDED.criticism_points,
                vibe = EXCLUDED.vibe,
                confidence = EXCLUDED.confidence,
                sources_count = EXCLUDED.sources_count,
                sources_urls = EXCLUDED.sources_urls,
                llm_model = EXCLUDED.llm_model,
                generated_at = EXCLUDED.generated_at,
                controversial = EXCLUDED.controversial,
                positive_pct = EXCLUDED.positive_pct,
                negative_pct = EXCLUDED.negative_pct,
                mixed_pct = EXCLUDED.mixed_pct,
                tags = EXCLUDED.tags
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        ))
        .bind(movie_id)
        .bind(review.verdict.as_str())
        .bind(&review.review_text)
        .bind(Json(&review.praise_points))
        .bind(Json(&review.criticism_points))
        .bind(&review.vibe)
        .bind(review.confidence.as_str())
        .bind(review.sources_count)
        .bind(Json(&review.sources_urls))
        .bind(&review.llm_model)
        .bind(review.generated_at)
        .bind(review.controversial)
        .bind(review.positive_pct)
        .bind(review.negative_pct)
        .bind(review.mixed_pct)
        .bind(Json(&review.tags))
        .fetch_one(&self.pool)
        .await?;

        Review::try_from(row)
    }

    async fn search_movies(&self, query: &str, limit: i64) -> AppResult<Vec<MovieWithReview>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies m WHERE m.title ILIKE $1 \
             ORDER BY m.tmdb_popularity DESC NULLS LAST LIMIT $2",
            MOVIE_COLUMNS
        ))
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let movies = rows
            .into_iter()
            .map(Movie::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        self.attach_reviews(movies).await
    }

    async fn list_movies(&self, query: MovieListQuery) -> AppResult<PaginatedMovies> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        Self::push_category_filter(&mut count_qb, query.category);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {}", MOVIE_COLUMNS));
        Self::push_category_filter(&mut qb, query.category);
        qb.push(Self::order_clause(query.category));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.limit));
        qb.push(" OFFSET ");
        qb.push_bind(query.offset());

        let rows: Vec<MovieRow> = qb
            .build_query_as::<MovieRow>()
            .fetch_all(&self.pool)
            .await?;
        let movies = rows
            .into_iter()
            .map(Movie::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedMovies {
            movies: self.attach_reviews(movies).await?,
            total,
            page: query.page,
            pages: query.pages_for(total),
        })
    }

    async fn record_search(&self, query: &str, ip_hash: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO search_events (query, ip_hash) VALUES ($1, $2)")
            .bind(query)
            .bind(ip_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BattleStore for PgStore {
    async fn find_battle(&self, a: i64, b: i64) -> AppResult<Option<BattleResult>> {
        let (first, second) = BattleResult::pair_key(a, b);
        let cached: Option<Json<BattleResult>> = sqlx::query_scalar(
            "SELECT result_json FROM battle_cache WHERE movie_a_id = $1 AND movie_b_id = $2",
        )
        .bind(first)
        .bind(second)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cached.map(|json| json.0))
    }

    async fn save_battle(&self, result: &BattleResult, llm_model: Option<String>) -> AppResult<()> {
        let (first, second) = BattleResult::pair_key(result.movie_a.tmdb_id, result.movie_b.tmdb_id);
        sqlx::query(
            r#"
            INSERT INTO battle_cache (movie_a_id, movie_b_id, winner_id, loser_id, winner_title,
                loser_title, kill_reason, breakdown, winner_headline, loser_headline,
                result_json, llm_model)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (movie_a_id, movie_b_id) DO UPDATE SET
                winner_id = EXCLUDED.winner_id,
                loser_id = EXCLUDED.loser_id,
                winner_title = EXCLUDED.winner_title,
                loser_title = EXCLUDED.loser_title,
                kill_reason = EXCLUDED.kill_reason,
                breakdown = EXCLUDED.breakdown,
                winner_headline = EXCLUDED.winner_headline,
                loser_headline = EXCLUDED.loser_headline,
                result_json = EXCLUDED.result_json,
                llm_model = EXCLUDED.llm_model
            "#,
        )
        .bind(first)
        .bind(second)
        .bind(result.winner_id)
        .bind(result.loser_id)
        .bind(&result.winner_title)
        .bind(&result.loser_title)
        .bind(&result.kill_reason)
        .bind(&result.breakdown)
        .bind(&result.winner_headline)
        .bind(&result.loser_headline)
        .bind(Json(result))
        .bind(llm_model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WatchlistStore for PgStore {
    async fn list_entries(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        let rows: Vec<WatchlistRow> = sqlx::query_as(
            "SELECT tmdb_id, media_type, title, poster_path, added_at FROM watchlist \
             WHERE user_id = $1 ORDER BY added_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WatchlistEntry::try_from).collect()
    }

    async fn upsert_entry(
        &self,
        user_id: &str,
        entry: AddWatchlistRequest,
        max_items: i64,
    ) -> AppResult<Option<WatchlistEntry>> {
        let mut tx = self.pool.begin().await?;

        // Serializes writers per user so the cap check and the insert agree
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let (exists, count): (bool, i64) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM watchlist WHERE user_id = $1 AND tmdb_id = $2), \
                    (SELECT COUNT(*) FROM watchlist WHERE user_id = $1)",
        )
        .bind(user_id)
        .bind(entry.tmdb_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists && count >= max_items {
            return Ok(None);
        }

        let row: WatchlistRow = sqlx::query_as(
            r#"
            INSERT INTO watchlist (user_id, tmdb_id, media_type, title, poster_path)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, tmdb_id) DO UPDATE SET
                media_type = EXCLUDED.media_type,
                title = EXCLUDED.title,
                poster_path = COALESCE(EXCLUDED.poster_path, watchlist.poster_path)
            RETURNING tmdb_id, media_type, title, poster_path, added_at
            "#,
        )
        .bind(user_id)
        .bind(entry.tmdb_id)
        .bind(entry.media_type.as_str())
        .bind(entry.title.trim())
        .bind(&entry.poster_path)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        WatchlistEntry::try_from(row).map(Some)
    }

    async fn remove_entry(&self, user_id: &str, tmdb_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND tmdb_id = $2")
            .bind(user_id)
            .bind(tmdb_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
