use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::{
    db::MovieStore,
    error::{AppError, AppResult},
    models::{GenerationMode, GenerationUpdate, MediaType, StartResponse, StartStatus},
    services::{
        jobs::{JobSnapshot, JobTracker},
        pipeline::{GenerationRequest, ReviewGenerator},
    },
};

const GENERIC_FAILURE: &str = "Review generation failed. Please try again.";

/// Updates for one title: a live feed while a job runs, else a single final value
pub enum UpdateFeed {
    Live {
        current: GenerationUpdate,
        updates: broadcast::Receiver<GenerationUpdate>,
    },
    Final(GenerationUpdate),
}

/// Starts background review jobs and answers status questions about them
pub struct GenerationService {
    store: Arc<dyn MovieStore>,
    jobs: Arc<JobTracker>,
    generator: Arc<dyn ReviewGenerator>,
}

impl GenerationService {
    pub fn new(store: Arc<dyn MovieStore>, generator: Arc<dyn ReviewGenerator>) -> Self {
        Self::with_jobs(store, generator, JobTracker::new())
    }

    pub fn with_jobs(
        store: Arc<dyn MovieStore>,
        generator: Arc<dyn ReviewGenerator>,
        jobs: Arc<JobTracker>,
    ) -> Self {
        Self {
            store,
            jobs,
            generator,
        }
    }

    /// The answer for requests that need no new job, if there is one
    ///
    /// Routes call this before charging the rate limiter.
    pub async fn precheck(
        &self,
        tmdb_id: i64,
        mode: GenerationMode,
    ) -> AppResult<Option<StartStatus>> {
        if self.jobs.is_running(tmdb_id) {
            return Ok(Some(StartStatus::Generating));
        }
        if mode == GenerationMode::Fresh {
            let reviewed = self
                .store
                .find_movie(tmdb_id)
                .await?
                .is_some_and(|m| m.review.is_some());
            if reviewed {
                return Ok(Some(StartStatus::AlreadyExists));
            }
        }
        Ok(None)
    }

    pub async fn start(
        &self,
        tmdb_id: i64,
        media_type: MediaType,
        mode: GenerationMode,
    ) -> AppResult<StartResponse> {
        let status = match self.precheck(tmdb_id, mode).await? {
            Some(status) => status,
            None => self.launch(GenerationRequest {
                tmdb_id,
                media_type,
                mode,
            }),
        };
        Ok(StartResponse { status, tmdb_id })
    }

    /// Spawns the job unless one is already running for the title
    pub fn launch(&self, request: GenerationRequest) -> StartStatus {
        let Some(handle) = self.jobs.begin(request.tmdb_id) else {
            return StartStatus::Generating;
        };

        let generator = Arc::clone(&self.generator);
        let span = tracing::info_span!(
            "generate_review",
            tmdb_id = request.tmdb_id,
            media_type = %request.media_type,
            mode = ?request.mode,
        );
        tokio::spawn(
            async move {
                tracing::info!("Review generation started");
                match generator.generate(request, &handle).await {
                    Ok(movie) => {
                        tracing::info!("Review generation completed");
                        handle.complete(movie);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Review generation failed");
                        handle.fail(public_message(&e));
                    }
                }
            }
            .instrument(span),
        );

        StartStatus::Generating
    }

    pub async fn status(&self, tmdb_id: i64) -> AppResult<GenerationUpdate> {
        match self.jobs.snapshot(tmdb_id) {
            Some(JobSnapshot::Running { progress }) => {
                return Ok(GenerationUpdate::Generating { progress })
            }
            Some(JobSnapshot::Failed { error }) => return Ok(GenerationUpdate::Error { error }),
            None => {}
        }

        Ok(match self.store.find_movie(tmdb_id).await? {
            Some(movie) if movie.review.is_some() => GenerationUpdate::Completed {
                movie: Box::new(movie),
            },
            _ => GenerationUpdate::NotFound,
        })
    }

    pub async fn subscribe(&self, tmdb_id: i64) -> AppResult<UpdateFeed> {
        if let Some((progress, updates)) = self.jobs.subscribe(tmdb_id) {
            return Ok(UpdateFeed::Live {
                current: GenerationUpdate::Generating { progress },
                updates,
            });
        }
        // The job may have finished between the two lookups; status covers that
        Ok(UpdateFeed::Final(self.status(tmdb_id).await?))
    }
}

/// Message safe to show end users for a failed job
fn public_message(error: &AppError) -> String {
    match error {
        AppError::NotFound(msg) => msg.clone(),
        AppError::Timeout(_) => "Review generation timed out. Please try again.".to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{Confidence, MovieWithReview, NewMovie, ReviewDraft, Verdict},
        services::jobs::ProgressReporter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct GatedGenerator {
        store: MemoryStore,
        calls: AtomicUsize,
        release: Notify,
        fail: bool,
    }

    impl GatedGenerator {
        fn new(store: MemoryStore, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                store,
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                fail,
            })
        }
    }

    fn new_movie(tmdb_id: i64) -> NewMovie {
        NewMovie {
            tmdb_id,
            title: "Heat".to_string(),
            original_title: None,
            media_type: MediaType::Movie,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            genres: vec![],
            release_date: None,
            tmdb_popularity: None,
            tmdb_vote_average: None,
            tmdb_vote_count: None,
        }
    }

    fn draft() -> ReviewDraft {
        ReviewDraft {
            verdict: Verdict::WorthIt,
            review_text: "Still great.".to_string(),
            praise_points: vec![],
            criticism_points: vec![],
            vibe: None,
            confidence: Confidence::Medium,
            sources_urls: vec![],
            llm_model: None,
            positive_pct: None,
            negative_pct: None,
            mixed_pct: None,
            tags: vec![],
        }
    }

    #[async_trait::async_trait]
    impl ReviewGenerator for GatedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
            progress: &dyn ProgressReporter,
        ) -> AppResult<MovieWithReview> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            progress.report("Searching for reviews...");
            self.release.notified().await;
            if self.fail {
                return Err(AppError::Internal("database password is hunter2".to_string()));
            }
            let movie = self.store.save_movie(new_movie(request.tmdb_id)).await?;
            let review = self.store.save_review(movie.id, draft()).await?;
            Ok(MovieWithReview {
                movie,
                review: Some(review),
            })
        }
    }

    async fn wait_for_terminal(service: &GenerationService, tmdb_id: i64) -> GenerationUpdate {
        match service.subscribe(tmdb_id).await.unwrap() {
            UpdateFeed::Final(update) => update,
            UpdateFeed::Live { mut updates, .. } => loop {
                let update = updates.recv().await.unwrap();
                if update.is_terminal() {
                    return update;
                }
            },
        }
    }

    #[tokio::test]
    async fn test_unknown_title_is_not_found() {
        let store = MemoryStore::new();
        let service = GenerationService::new(
            Arc::new(store.clone()),
            GatedGenerator::new(store, false),
        );
        assert_eq!(service.status(1).await.unwrap(), GenerationUpdate::NotFound);
        assert!(matches!(
            service.subscribe(1).await.unwrap(),
            UpdateFeed::Final(GenerationUpdate::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_start_runs_one_job_and_completes() {
        let store = MemoryStore::new();
        let generator = GatedGenerator::new(store.clone(), false);
        let service = GenerationService::new(Arc::new(store), generator.clone());

        let first = service
            .start(949, MediaType::Movie, GenerationMode::Fresh)
            .await
            .unwrap();
        let second = service
            .start(949, MediaType::Movie, GenerationMode::Fresh)
            .await
            .unwrap();
        assert_eq!(first.status, StartStatus::Generating);
        assert_eq!(second.status, StartStatus::Generating);

        assert!(matches!(
            service.status(949).await.unwrap(),
            GenerationUpdate::Generating { .. }
        ));

        generator.release.notify_one();
        let terminal = wait_for_terminal(&service, 949).await;
        assert!(matches!(terminal, GenerationUpdate::Completed { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        assert!(matches!(
            service.status(949).await.unwrap(),
            GenerationUpdate::Completed { .. }
        ));
        let again = service
            .start(949, MediaType::Movie, GenerationMode::Fresh)
            .await
            .unwrap();
        assert_eq!(again.status, StartStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn test_regenerate_ignores_existing_review() {
        let store = MemoryStore::new();
        let movie = store.save_movie(new_movie(949)).await.unwrap();
        store.save_review(movie.id, draft()).await.unwrap();

        let generator = GatedGenerator::new(store.clone(), false);
        let service = GenerationService::new(Arc::new(store), generator.clone());

        assert_eq!(
            service.precheck(949, GenerationMode::Fresh).await.unwrap(),
            Some(StartStatus::AlreadyExists)
        );
        assert_eq!(
            service.precheck(949, GenerationMode::Regenerate).await.unwrap(),
            None
        );

        let response = service
            .start(949, MediaType::Movie, GenerationMode::Regenerate)
            .await
            .unwrap();
        assert_eq!(response.status, StartStatus::Generating);
        // A running job wins over the stored review
        assert!(matches!(
            service.status(949).await.unwrap(),
            GenerationUpdate::Generating { .. }
        ));
        generator.release.notify_one();
        wait_for_terminal(&service, 949).await;
    }

    #[tokio::test]
    async fn test_failure_is_reported_without_internal_details() {
        let store = MemoryStore::new();
        let generator = GatedGenerator::new(store.clone(), true);
        let service = GenerationService::new(Arc::new(store), generator.clone());

        service
            .start(5, MediaType::Tv, GenerationMode::Fresh)
            .await
            .unwrap();
        generator.release.notify_one();

        let terminal = wait_for_terminal(&service, 5).await;
        assert_eq!(
            terminal,
            GenerationUpdate::Error {
                error: GENERIC_FAILURE.to_string()
            }
        );
        assert_eq!(service.status(5).await.unwrap(), terminal);
    }

    #[test]
    fn test_public_message_keeps_not_found() {
        assert_eq!(
            public_message(&AppError::NotFound("Title 5 not found on TMDB".to_string())),
            "Title 5 not found on TMDB"
        );
        assert_eq!(
            public_message(&AppError::Internal("secret".to_string())),
            GENERIC_FAILURE
        );
    }
}
