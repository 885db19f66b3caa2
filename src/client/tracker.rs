use chrono::{NaiveDate, Utc};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    client::{
        progress::{ProgressPresenter, ProgressView},
        revalidate::{review_path, Revalidator},
        sse::SseDecoder,
        ClientError, ReviewApi,
    },
    models::{
        GenerationMode, GenerationUpdate, MediaType, MovieWithReview, StartStatus, INITIAL_PROGRESS,
    },
};

/// Where the tracker is in the generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
}

/// How updates are currently arriving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    None,
    Stream,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Unreleased,
    Request,
    Generation,
    Timeout,
}

/// A failure worth showing, with a retry affordance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ClientError> for TrackerError {
    fn from(error: &ClientError) -> Self {
        let kind = match error {
            ClientError::RateLimited(_) => ErrorKind::RateLimited,
            ClientError::Unreleased => ErrorKind::Unreleased,
            ClientError::Timeout => ErrorKind::Timeout,
            ClientError::Generation(_) => ErrorKind::Generation,
            ClientError::Http { .. } | ClientError::Transport(_) | ClientError::Decode(_) => {
                ErrorKind::Request
            }
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Everything a view needs to render the review section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerState {
    pub phase: Phase,
    pub progress: Option<ProgressView>,
    /// The review currently on screen
    pub review: Option<Box<MovieWithReview>>,
    pub error: Option<TrackerError>,
    pub transport: Transport,
}

impl TrackerState {
    pub fn is_settled(&self) -> bool {
        self.phase != Phase::Generating
    }
}

/// Identifies the title being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleRef {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub release_date: Option<NaiveDate>,
}

impl TitleRef {
    pub fn is_unreleased(&self, today: NaiveDate) -> bool {
        self.release_date.is_some_and(|date| date > today)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    /// Status checks before giving up
    pub max_polls: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_polls: 90,
        }
    }
}

/// Starts a generation job and follows it, over SSE when possible and by
/// polling otherwise
///
/// One network stream or polling loop at a time; a new request or dropping
/// the tracker cancels the previous one.
pub struct ReviewTracker {
    api: ReviewApi,
    revalidator: Arc<dyn Revalidator>,
    config: TrackerConfig,
    state: Arc<watch::Sender<TrackerState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReviewTracker {
    pub fn new(api: ReviewApi, revalidator: Arc<dyn Revalidator>, config: TrackerConfig) -> Self {
        let (state, _) = watch::channel(TrackerState::default());
        Self {
            api,
            revalidator,
            config,
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    /// Starts from a review that is already on screen
    pub fn with_review(self, review: MovieWithReview) -> Self {
        self.state.send_modify(|state| {
            state.phase = Phase::Completed;
            state.review = Some(Box::new(review));
        });
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TrackerState {
        self.state.borrow().clone()
    }

    /// First-time generation
    pub fn generate(&self, title: TitleRef) -> Result<(), ClientError> {
        self.request(title, GenerationMode::Fresh)
    }

    /// Replaces the displayed review with a freshly generated one
    pub fn regenerate(&self, title: TitleRef) -> Result<(), ClientError> {
        self.request(title, GenerationMode::Regenerate)
    }

    fn request(&self, title: TitleRef, mode: GenerationMode) -> Result<(), ClientError> {
        // Refused before any request; whatever is on screen stays as it was
        if title.is_unreleased(Utc::now().date_naive()) {
            return Err(ClientError::Unreleased);
        }

        self.cancel();
        self.state.send_modify(|state| {
            state.phase = Phase::Generating;
            state.progress = None;
            state.error = None;
            state.transport = Transport::None;
            if mode == GenerationMode::Regenerate {
                state.review = None;
            }
        });

        let run = Run {
            api: self.api.clone(),
            revalidator: Arc::clone(&self.revalidator),
            config: self.config,
            state: Arc::clone(&self.state),
            presenter: ProgressPresenter::new(),
            title,
        };
        let handle = tokio::spawn(run.execute(mode));
        *self.lock_task() = Some(handle);
        Ok(())
    }

    /// Stops any stream or polling loop without touching the displayed state
    pub fn cancel(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
        self.state.send_if_modified(|state| {
            let previous = std::mem::replace(&mut state.transport, Transport::None);
            previous != Transport::None
        });
    }

    /// Resolves once the current request has completed or failed
    pub async fn settled(&self) -> TrackerState {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(TrackerState::is_settled).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ReviewTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}

enum StreamOutcome {
    Finished,
    Dropped,
}

/// One request's worth of background work
struct Run {
    api: ReviewApi,
    revalidator: Arc<dyn Revalidator>,
    config: TrackerConfig,
    state: Arc<watch::Sender<TrackerState>>,
    presenter: ProgressPresenter,
    title: TitleRef,
}

impl Run {
    async fn execute(mut self, mode: GenerationMode) {
        let tmdb_id = self.title.tmdb_id;
        self.progress(INITIAL_PROGRESS);

        let started = match self.api.start(tmdb_id, self.title.media_type, mode).await {
            Ok(started) => started,
            Err(e) => return self.fail(&e),
        };

        if started.status == StartStatus::AlreadyExists {
            match self.api.status(tmdb_id).await {
                Ok(GenerationUpdate::Completed { movie }) => return self.complete(movie).await,
                Ok(update) => {
                    tracing::debug!(status = update.event_name(), "Review missing despite already_exists");
                }
                Err(e) => return self.fail(&e),
            }
        }

        if let StreamOutcome::Finished = self.stream().await {
            return;
        }
        self.poll().await;
    }

    async fn stream(&mut self) -> StreamOutcome {
        let tmdb_id = self.title.tmdb_id;
        let mut response = match self.api.open_stream(tmdb_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "Could not open event stream, polling instead");
                return StreamOutcome::Dropped;
            }
        };
        self.set_transport(Transport::Stream);

        let mut decoder = SseDecoder::new();
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    tracing::debug!("Event stream ended before a final update");
                    return StreamOutcome::Dropped;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Event stream dropped, polling instead");
                    return StreamOutcome::Dropped;
                }
            };

            for event in decoder.push(&chunk) {
                let update: GenerationUpdate = match serde_json::from_str(&event.data) {
                    Ok(update) => update,
                    Err(e) => {
                        tracing::debug!(error = %e, event = event.name(), "Ignoring unreadable event");
                        continue;
                    }
                };
                match update {
                    GenerationUpdate::Generating { progress } => self.progress(&progress),
                    GenerationUpdate::Completed { movie } => {
                        self.complete(movie).await;
                        return StreamOutcome::Finished;
                    }
                    GenerationUpdate::Error { error } => {
                        self.fail(&ClientError::Generation(error));
                        return StreamOutcome::Finished;
                    }
                    GenerationUpdate::NotFound => return StreamOutcome::Dropped,
                }
            }
        }
    }

    async fn poll(&mut self) {
        self.set_transport(Transport::Polling);

        for attempt in 0..self.config.max_polls {
            // First check right away so a dropped stream costs no extra wait
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }

            match self.api.status(self.title.tmdb_id).await {
                Ok(GenerationUpdate::Generating { progress }) => self.progress(&progress),
                Ok(GenerationUpdate::Completed { movie }) => return self.complete(movie).await,
                Ok(GenerationUpdate::Error { error }) => {
                    return self.fail(&ClientError::Generation(error))
                }
                Ok(GenerationUpdate::NotFound) => {}
                Err(e) => tracing::debug!(error = %e, attempt, "Status check failed, will retry"),
            }
        }

        self.fail(&ClientError::Timeout);
    }

    fn progress(&mut self, message: &str) {
        let view = self.presenter.update(message);
        self.state.send_modify(|state| state.progress = Some(view));
    }

    fn set_transport(&self, transport: Transport) {
        self.state.send_modify(|state| state.transport = transport);
    }

    async fn complete(&mut self, movie: Box<MovieWithReview>) {
        let path = review_path(movie.movie.media_type, movie.movie.tmdb_id);
        let view = self.presenter.complete();
        self.state.send_modify(|state| {
            state.phase = Phase::Completed;
            state.progress = Some(view);
            state.review = Some(movie);
            state.error = None;
            state.transport = Transport::None;
        });

        if let Err(e) = self.revalidator.revalidate(&path).await {
            tracing::warn!(error = %e, path = %path, "Page revalidation failed");
        }
    }

    fn fail(&mut self, error: &ClientError) {
        tracing::debug!(error = %error, "Generation request failed");
        self.state.send_modify(|state| {
            state.phase = Phase::Error;
            state.error = Some(TrackerError::from(error));
            state.transport = Transport::None;
        });
    }
}
