use serde::Deserialize;
use std::{sync::Arc, time::Duration};

use crate::{
    db::{BattleStore, MovieStore},
    error::{AppError, AppResult},
    models::{BattleResult, Contender, MediaType, Movie, MovieWithReview, NewMovie},
    services::providers::{
        llm::strip_code_fences, LanguageModel, MetadataProvider, Prompt,
    },
};

const REVIEW_EXCERPT_CHARS: usize = 500;
const DEFAULT_WINNER_HEADLINE: &str = "The Winner";
const DEFAULT_LOSER_HEADLINE: &str = "Good Try";

const BATTLE_SYSTEM_PROMPT: &str = r#"You referee head-to-head battles between two movies or TV shows for "Worth the Watch?".
Pick the one a typical viewer would enjoy more tonight, using the context given and what you know about both titles. Be decisive and a little playful.

Respond with a single JSON object:
- "winner": "a" or "b"
- "kill_reason": one punchy sentence on why the winner wins
- "breakdown": 2-3 sentences comparing them fairly
- "winner_headline": 2-4 word headline for the winner
- "loser_headline": 2-4 word consolation headline for the loser"#;

struct Fighter {
    contender: Contender,
    context: String,
}

#[derive(Debug, Deserialize)]
struct Judgement {
    winner: String,
    #[serde(default)]
    kill_reason: String,
    #[serde(default)]
    breakdown: String,
    #[serde(default)]
    winner_headline: Option<String>,
    #[serde(default)]
    loser_headline: Option<String>,
}

/// AI-judged 1v1 comparisons, cached per pair
pub struct BattleService {
    movies: Arc<dyn MovieStore>,
    battles: Arc<dyn BattleStore>,
    metadata: Arc<dyn MetadataProvider>,
    llm: Arc<dyn LanguageModel>,
}

impl BattleService {
    pub fn new(
        movies: Arc<dyn MovieStore>,
        battles: Arc<dyn BattleStore>,
        metadata: Arc<dyn MetadataProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            movies,
            battles,
            metadata,
            llm,
        }
    }

    pub fn validate_pair(movie_a_id: i64, movie_b_id: i64) -> AppResult<()> {
        if movie_a_id <= 0 || movie_b_id <= 0 {
            return Err(AppError::InvalidInput(
                "movie ids must be positive integers".to_string(),
            ));
        }
        if movie_a_id == movie_b_id {
            return Err(AppError::InvalidInput(
                "A title cannot battle itself".to_string(),
            ));
        }
        Ok(())
    }

    /// A previously judged battle for this pair, oriented to the request
    pub async fn cached(&self, movie_a_id: i64, movie_b_id: i64) -> AppResult<Option<BattleResult>> {
        let cached = self.battles.find_battle(movie_a_id, movie_b_id).await?;
        Ok(cached.map(|result| result.oriented(movie_a_id)))
    }

    pub async fn fight(&self, movie_a_id: i64, movie_b_id: i64) -> AppResult<BattleResult> {
        let (a, b) = tokio::try_join!(self.fighter(movie_a_id), self.fighter(movie_b_id))?;

        let prompt = Prompt {
            system: BATTLE_SYSTEM_PROMPT.to_string(),
            user: format!("Movie A:\n{}\n\nMovie B:\n{}", a.context, b.context),
            max_tokens: 500,
            temperature: 0.8,
            timeout: Duration::from_secs(30),
        };
        let completion = self.llm.complete(&prompt).await?;
        let result = judge(&completion.content, a.contender, b.contender)?;

        tracing::info!(
            movie_a_id,
            movie_b_id,
            winner_id = result.winner_id,
            "Battle judged"
        );
        if let Err(e) = self.battles.save_battle(&result, Some(completion.model)).await {
            tracing::warn!(error = %e, "Failed to cache battle result");
        }
        Ok(result)
    }

    async fn fighter(&self, tmdb_id: i64) -> AppResult<Fighter> {
        if let Some(stored) = self.movies.find_movie(tmdb_id).await? {
            return Ok(Fighter {
                context: stored_context(&stored),
                contender: contender(&stored),
            });
        }

        let details = self.details_any_type(tmdb_id).await?;
        let fetched = MovieWithReview {
            movie: Movie::from_new(0, details, chrono::Utc::now()),
            review: None,
        };
        Ok(Fighter {
            context: stored_context(&fetched),
            contender: contender(&fetched),
        })
    }

    /// Battles only carry an id, so try it as a movie and then as a show
    async fn details_any_type(&self, tmdb_id: i64) -> AppResult<NewMovie> {
        match self.metadata.details(tmdb_id, MediaType::Movie).await {
            Ok(details) => Ok(details),
            Err(AppError::NotFound(_)) => self
                .metadata
                .details(tmdb_id, MediaType::Tv)
                .await
                .map_err(|e| match e {
                    AppError::NotFound(_) => {
                        AppError::NotFound(format!("Title {} not found", tmdb_id))
                    }
                    other => other,
                }),
            Err(e) => Err(e),
        }
    }
}

fn header(movie: &Movie) -> String {
    let year = movie.year();
    let mut header = if year.is_empty() {
        format!("Title: {}", movie.title)
    } else {
        format!("Title: {} ({})", movie.title, year)
    };
    let genres = movie.genre_names();
    if !genres.is_empty() {
        header.push_str(&format!("\nGenres: {}", genres));
    }
    header
}

/// What the judge is told about one side
fn stored_context(stored: &MovieWithReview) -> String {
    let Some(review) = &stored.review else {
        return format!(
            "{}\nTMDB score: {}\n(No detailed review available, use your knowledge of this film)",
            header(&stored.movie),
            stored
                .movie
                .tmdb_vote_average
                .map(|v| format!("{:.1}/10", v))
                .unwrap_or_else(|| "unknown".to_string()),
        );
    };

    let excerpt: String = review.review_text.chars().take(REVIEW_EXCERPT_CHARS).collect();
    let mut context = format!(
        "{}\nVerdict: {}\nReview excerpt: {}",
        header(&stored.movie),
        review.verdict,
        excerpt
    );
    if !review.praise_points.is_empty() {
        context.push_str(&format!("\nPraised: {}", review.praise_points.join(", ")));
    }
    if !review.criticism_points.is_empty() {
        context.push_str(&format!(
            "\nCriticized: {}",
            review.criticism_points.join(", ")
        ));
    }
    context
}

fn contender(stored: &MovieWithReview) -> Contender {
    let movie = &stored.movie;
    Contender {
        tmdb_id: movie.tmdb_id,
        title: movie.title.clone(),
        poster_path: movie.poster_path.clone(),
        backdrop_path: movie.backdrop_path.clone(),
        release_date: movie.release_date,
        tmdb_vote_average: movie.tmdb_vote_average,
        verdict: stored.review.as_ref().map(|r| r.verdict),
        imdb_score: stored.review.as_ref().and_then(|r| r.imdb_score),
    }
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Builds the result from the judge's answer; anything unusable is an upstream error
fn judge(content: &str, a: Contender, b: Contender) -> AppResult<BattleResult> {
    let verdict: Judgement = serde_json::from_str(strip_code_fences(content)).map_err(|e| {
        tracing::warn!(error = %e, "Battle judge returned unparseable output");
        AppError::ExternalApi("Battle judge returned an unreadable answer".to_string())
    })?;

    let a_wins = match verdict.winner.trim().to_lowercase().as_str() {
        "a" => true,
        "b" => false,
        other => {
            tracing::warn!(winner = other, "Battle judge picked an unknown side");
            return Err(AppError::ExternalApi(
                "Battle judge returned an unreadable answer".to_string(),
            ));
        }
    };
    let (winner, loser) = if a_wins { (&a, &b) } else { (&b, &a) };

    Ok(BattleResult {
        winner_id: winner.tmdb_id,
        loser_id: loser.tmdb_id,
        winner_title: winner.title.clone(),
        loser_title: loser.title.clone(),
        kill_reason: verdict.kill_reason.trim().to_string(),
        breakdown: verdict.breakdown.trim().to_string(),
        winner_headline: non_blank(verdict.winner_headline, DEFAULT_WINNER_HEADLINE),
        loser_headline: non_blank(verdict.loser_headline, DEFAULT_LOSER_HEADLINE),
        movie_a: a,
        movie_b: b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{Confidence, ReviewDraft, Verdict},
        services::providers::{llm::MockLanguageModel, tmdb::MockMetadataProvider, Completion},
    };

    fn new_movie(tmdb_id: i64, title: &str, media_type: MediaType) -> NewMovie {
        NewMovie {
            tmdb_id,
            title: title.to_string(),
            original_title: None,
            media_type,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            genres: vec![],
            release_date: None,
            tmdb_popularity: None,
            tmdb_vote_average: Some(8.1),
            tmdb_vote_count: None,
        }
    }

    fn draft() -> ReviewDraft {
        ReviewDraft {
            verdict: Verdict::WorthIt,
            review_text: "x".repeat(800),
            praise_points: vec!["Tension".to_string()],
            criticism_points: vec![],
            vibe: None,
            confidence: Confidence::High,
            sources_urls: vec![],
            llm_model: None,
            positive_pct: None,
            negative_pct: None,
            mixed_pct: None,
            tags: vec![],
        }
    }

    fn llm(content: &'static str) -> MockLanguageModel {
        let mut llm = MockLanguageModel::new();
        llm.expect_complete().returning(move |_| {
            Ok(Completion {
                content: content.to_string(),
                model: "deepseek-chat".to_string(),
            })
        });
        llm
    }

    fn battle_service(
        store: MemoryStore,
        metadata: MockMetadataProvider,
        llm: MockLanguageModel,
    ) -> BattleService {
        BattleService::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(metadata),
            Arc::new(llm),
        )
    }

    #[test]
    fn test_validate_pair() {
        assert!(BattleService::validate_pair(1, 2).is_ok());
        assert!(matches!(
            BattleService::validate_pair(3, 3),
            Err(AppError::InvalidInput(_))
        ));
        assert!(BattleService::validate_pair(0, 3).is_err());
    }

    #[tokio::test]
    async fn test_fight_uses_stored_reviews_and_caches_result() {
        let store = MemoryStore::new();
        let alien = store
            .save_movie(new_movie(348, "Alien", MediaType::Movie))
            .await
            .unwrap();
        store.save_review(alien.id, draft()).await.unwrap();
        store
            .save_movie(new_movie(679, "Aliens", MediaType::Movie))
            .await
            .unwrap();

        let mut metadata = MockMetadataProvider::new();
        metadata.expect_details().never();
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .withf(|prompt| {
                prompt.user.contains("Verdict: WORTH IT")
                    && prompt.user.contains("Praised: Tension")
                    && prompt.user.contains("No detailed review available")
                    && !prompt.user.contains(&"x".repeat(501))
            })
            .times(1)
            .returning(|_| {
                Ok(Completion {
                    content: r#"{"winner": "b", "kill_reason": "More guns.", "breakdown": "Both rule.", "winner_headline": "Game Over, Man"}"#.to_string(),
                    model: "deepseek-chat".to_string(),
                })
            });

        let service = battle_service(store, metadata, model);
        let result = service.fight(348, 679).await.unwrap();
        assert_eq!(result.winner_id, 679);
        assert_eq!(result.loser_title, "Alien");
        assert_eq!(result.winner_headline, "Game Over, Man");
        assert_eq!(result.loser_headline, DEFAULT_LOSER_HEADLINE);
        assert_eq!(result.movie_a.verdict, Some(Verdict::WorthIt));

        // Cached either way round, oriented to the request
        let cached = service.cached(679, 348).await.unwrap().unwrap();
        assert_eq!(cached.movie_a.tmdb_id, 679);
        assert_eq!(cached.winner_id, 679);
    }

    #[tokio::test]
    async fn test_unknown_movie_falls_back_to_tv_details() {
        let store = MemoryStore::new();
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_details()
            .returning(|id, media_type| match (id, media_type) {
                (1396, MediaType::Movie) => Err(AppError::NotFound("no movie".to_string())),
                (1396, MediaType::Tv) => Ok(new_movie(1396, "Breaking Bad", MediaType::Tv)),
                (id, _) => Ok(new_movie(id, "Heat", MediaType::Movie)),
            });

        let service = battle_service(store, metadata, llm(r#"{"winner": "A", "kill_reason": "Say my name."}"#));
        let result = service.fight(1396, 949).await.unwrap();
        assert_eq!(result.winner_title, "Breaking Bad");
        assert_eq!(result.winner_headline, DEFAULT_WINNER_HEADLINE);
    }

    #[tokio::test]
    async fn test_missing_title_is_not_found() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_details()
            .returning(|_, _| Err(AppError::NotFound("nope".to_string())));

        let service = battle_service(MemoryStore::new(), metadata, llm("{}"));
        let result = service.fight(1, 2).await;
        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_unparseable_judgement_is_bad_gateway() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_details()
            .returning(|id, _| Ok(new_movie(id, "Heat", MediaType::Movie)));

        let service = battle_service(MemoryStore::new(), metadata, llm("I refuse to choose"));
        assert!(matches!(
            service.fight(1, 2).await,
            Err(AppError::ExternalApi(_))
        ));

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_details()
            .returning(|id, _| Ok(new_movie(id, "Heat", MediaType::Movie)));
        let service = battle_service(MemoryStore::new(), metadata, llm(r#"{"winner": "c"}"#));
        assert!(service.fight(1, 2).await.is_err());
    }
}
