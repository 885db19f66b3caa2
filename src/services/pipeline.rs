use serde::Deserialize;
use std::{sync::Arc, time::Duration};

use crate::{
    db::MovieStore,
    error::AppResult,
    models::{
        Confidence, GenerationMode, MediaType, Movie, MovieWithReview, ReviewDraft, Verdict,
    },
    services::{
        jobs::ProgressReporter,
        opinion_grep::{self, MAX_PARAGRAPHS, MAX_SOURCES},
        providers::{
            llm::strip_code_fences, read_many, ArticleReader, LanguageModel, MetadataProvider,
            Prompt, ReviewSearch, WebResult,
        },
        retry::RetryPolicy,
    },
};

pub const STEP_DETAILS: &str = "Fetching title details...";
pub const STEP_SEARCHING: &str = "Searching for reviews...";
pub const STEP_GATHERING: &str = "Gathering opinions...";
pub const STEP_ANALYZING: &str = "Analyzing feedback...";
pub const STEP_WRITING: &str = "Writing your verdict...";
pub const STEP_SAVING: &str = "Saving review...";

const MAX_OPINION_CHARS: usize = 18_000;
const MIN_OPINION_CHARS: usize = 50;
const SNIPPET_FALLBACK_LIMIT: usize = 15;
const MIN_ARTICLES_BEFORE_BACKFILL: usize = 3;
const MAX_LIST_ITEMS: usize = 5;

const LIMITED_DISCUSSION_NOTE: &str = "Very limited crowd discussion found for this title. \
Base your review on the movie description and any general knowledge you have.";

const REVIEW_SYSTEM_PROMPT: &str = r#"You are the voice of "Worth the Watch?", a site that tells people whether a movie or TV show deserves their evening.
You receive opinions collected from critics and Reddit threads. Write the consensus as a friend who has read all of it would: direct, specific, no spoilers, no marketing language.

Respond with a single JSON object with these fields:
- "review_text": 2-3 short paragraphs summarizing what people actually think
- "verdict": exactly one of "WORTH IT", "NOT WORTH IT", "MIXED BAG"
- "praise_points": up to 5 short phrases people praised
- "criticism_points": up to 5 short phrases people criticized
- "vibe": one sentence describing who will enjoy it and in what mood
- "positive_pct", "negative_pct", "mixed_pct": integers estimating the share of opinions in each camp, summing to 100
- "tags": up to 5 Title-Case tags such as "Slow Burn" or "Great Soundtrack"

Only use opinions present in the material. If the sources disagree, say so."#;

/// One unit of work for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub mode: GenerationMode,
}

/// Produces and stores a review for one title
#[async_trait::async_trait]
pub trait ReviewGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> AppResult<MovieWithReview>;
}

/// Search, read, grep, synthesize, save
pub struct ReviewPipeline {
    store: Arc<dyn MovieStore>,
    metadata: Arc<dyn MetadataProvider>,
    search: Arc<dyn ReviewSearch>,
    reader: Arc<dyn ArticleReader>,
    llm: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl ReviewPipeline {
    pub fn new(
        store: Arc<dyn MovieStore>,
        metadata: Arc<dyn MetadataProvider>,
        search: Arc<dyn ReviewSearch>,
        reader: Arc<dyn ArticleReader>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            store,
            metadata,
            search,
            reader,
            llm,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stored movie for a fresh run; regeneration always refreshes metadata
    async fn get_or_create_movie(&self, request: GenerationRequest) -> AppResult<Movie> {
        if request.mode == GenerationMode::Fresh {
            if let Some(existing) = self.store.find_movie(request.tmdb_id).await? {
                return Ok(existing.movie);
            }
        }

        let details = self
            .retry
            .run("tmdb details", || {
                self.metadata.details(request.tmdb_id, request.media_type)
            })
            .await?;
        self.store.save_movie(details).await
    }

    async fn search_all(&self, movie: &Movie) -> Vec<WebResult> {
        let year = movie.year();
        let (critic, reddit) = tokio::join!(
            self.retry.run("review search", || {
                self.search
                    .search_reviews(&movie.title, &year, movie.media_type)
            }),
            self.retry.run("reddit search", || {
                self.search
                    .search_reddit(&movie.title, &year, movie.media_type)
            }),
        );

        let mut results = critic.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Critic review search failed");
            Vec::new()
        });
        results.extend(reddit.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Reddit search failed");
            Vec::new()
        }));
        results
    }

    async fn synthesize(
        &self,
        movie: &Movie,
        opinions: &str,
        confidence: Confidence,
        sources_urls: Vec<String>,
    ) -> AppResult<ReviewDraft> {
        let prompt = Prompt {
            system: REVIEW_SYSTEM_PROMPT.to_string(),
            user: review_prompt(movie, opinions, confidence, &sources_urls),
            max_tokens: 800,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        };
        let completion = self.llm.complete(&prompt).await?;
        Ok(parse_review(
            &completion.content,
            Some(completion.model),
            confidence,
            sources_urls,
        ))
    }

    async fn save(&self, movie: Movie, draft: ReviewDraft) -> AppResult<MovieWithReview> {
        let review = self.store.save_review(movie.id, draft).await?;
        tracing::info!(
            tmdb_id = movie.tmdb_id,
            verdict = %review.verdict,
            sources = review.sources_count,
            "Review saved"
        );
        Ok(MovieWithReview {
            movie,
            review: Some(review),
        })
    }
}

#[async_trait::async_trait]
impl ReviewGenerator for ReviewPipeline {
    async fn generate(
        &self,
        request: GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> AppResult<MovieWithReview> {
        progress.report(STEP_DETAILS);
        let movie = self.get_or_create_movie(request).await?;

        progress.report(STEP_SEARCHING);
        let results = self.search_all(&movie).await;

        if results.is_empty() {
            tracing::warn!(tmdb_id = movie.tmdb_id, "No search results, reviewing from metadata only");
            progress.report(STEP_WRITING);
            let draft = self
                .synthesize(&movie, LIMITED_DISCUSSION_NOTE, Confidence::Low, Vec::new())
                .await?;
            progress.report(STEP_SAVING);
            return self.save(movie, draft).await;
        }

        let selection = opinion_grep::select_sources(&results, &movie.title, MAX_SOURCES);

        progress.report(STEP_GATHERING);
        let mut articles = read_many(self.reader.as_ref(), &selection.selected).await;
        if articles.len() < MIN_ARTICLES_BEFORE_BACKFILL && !selection.backfill.is_empty() {
            tracing::info!(
                read = articles.len(),
                backfill = selection.backfill.len(),
                "Too few articles read, trying backfill sources"
            );
            articles.extend(read_many(self.reader.as_ref(), &selection.backfill).await);
        }
        let articles_read = articles.len();
        if articles.is_empty() {
            articles.push(opinion_grep::snippets(&results, SNIPPET_FALLBACK_LIMIT));
        }

        progress.report(STEP_ANALYZING);
        let mut opinions = opinion_grep::extract_opinions(&articles, MAX_PARAGRAPHS);
        if opinions.chars().count() < MIN_OPINION_CHARS {
            opinions = opinion_grep::snippets(&results, SNIPPET_FALLBACK_LIMIT);
        }
        let opinions = truncate_chars(&opinions, MAX_OPINION_CHARS);

        progress.report(STEP_WRITING);
        let confidence = Confidence::from_articles_read(articles_read);
        let draft = self
            .synthesize(&movie, &opinions, confidence, selection.selected)
            .await?;

        progress.report(STEP_SAVING);
        self.save(movie, draft).await
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn data_context(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => {
            "Plenty of sources were read. Be specific and confident about the consensus."
        }
        Confidence::Medium => {
            "A moderate number of sources were read. Note where opinions are thin."
        }
        Confidence::Low => {
            "Very few sources were available. Keep the review short and hedge where the evidence is weak."
        }
    }
}

fn review_prompt(
    movie: &Movie,
    opinions: &str,
    confidence: Confidence,
    sources_urls: &[String],
) -> String {
    let kind = match movie.media_type {
        MediaType::Movie => "Movie",
        MediaType::Tv => "TV series",
    };
    let reddit_sources = sources_urls
        .iter()
        .filter(|u| u.contains("reddit.com"))
        .count();
    let rating = match (movie.tmdb_vote_average, movie.tmdb_vote_count) {
        (Some(avg), Some(count)) => format!("{:.1}/10 from {} votes", avg, count),
        (Some(avg), None) => format!("{:.1}/10", avg),
        _ => "unknown".to_string(),
    };

    format!(
        "Title: {title} ({year})\nType: {kind}\nGenres: {genres}\nOverview: {overview}\nTMDB rating: {rating}\n\n\
         Sources analyzed: {sources} ({reddit} Reddit threads)\n{context}\n\n\
         Opinions:\n{opinions}",
        title = movie.title,
        year = movie.year(),
        kind = kind,
        genres = movie.genre_names(),
        overview = movie.overview.as_deref().unwrap_or(""),
        rating = rating,
        sources = sources_urls.len(),
        reddit = reddit_sources,
        context = data_context(confidence),
        opinions = opinions,
    )
}

#[derive(Debug, Deserialize)]
struct LlmReview {
    review_text: String,
    verdict: String,
    #[serde(default)]
    praise_points: Vec<String>,
    #[serde(default)]
    criticism_points: Vec<String>,
    #[serde(default)]
    vibe: Option<String>,
    #[serde(default)]
    positive_pct: Option<i32>,
    #[serde(default)]
    negative_pct: Option<i32>,
    #[serde(default)]
    mixed_pct: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
}

type Sentiment = (Option<i32>, Option<i32>, Option<i32>);

/// Percentages survive only as a complete split that adds up to 100
fn validated_sentiment(positive: Option<i32>, negative: Option<i32>, mixed: Option<i32>) -> Sentiment {
    match (positive, negative, mixed) {
        (Some(p), Some(n), Some(m))
            if [p, n, m].iter().all(|v| (0..=100).contains(v)) && p + n + m == 100 =>
        {
            (Some(p), Some(n), Some(m))
        }
        _ => (None, None, None),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect()
}

/// Turns model output into a draft; malformed output degrades instead of failing
pub fn parse_review(
    content: &str,
    llm_model: Option<String>,
    confidence: Confidence,
    sources_urls: Vec<String>,
) -> ReviewDraft {
    let body = strip_code_fences(content);
    let parsed: LlmReview = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "LLM returned unparseable review, using raw text");
            return ReviewDraft {
                verdict: Verdict::MixedBag,
                review_text: body.to_string(),
                praise_points: Vec::new(),
                criticism_points: Vec::new(),
                vibe: None,
                confidence: Confidence::Low,
                sources_urls,
                llm_model,
                positive_pct: None,
                negative_pct: None,
                mixed_pct: None,
                tags: Vec::new(),
            };
        }
    };

    let verdict = parsed.verdict.parse::<Verdict>().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unknown verdict from LLM, using MIXED BAG");
        Verdict::MixedBag
    });
    let (positive_pct, negative_pct, mixed_pct) =
        validated_sentiment(parsed.positive_pct, parsed.negative_pct, parsed.mixed_pct);

    ReviewDraft {
        verdict,
        review_text: parsed.review_text.trim().to_string(),
        praise_points: clean_list(parsed.praise_points),
        criticism_points: clean_list(parsed.criticism_points),
        vibe: parsed.vibe.filter(|v| !v.trim().is_empty()),
        confidence,
        sources_urls,
        llm_model,
        positive_pct,
        negative_pct,
        mixed_pct,
        tags: clean_list(parsed.tags),
    }
}
