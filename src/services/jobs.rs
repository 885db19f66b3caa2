use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::sync::broadcast;

use crate::models::{GenerationUpdate, MovieWithReview, INITIAL_PROGRESS};

/// How long a failed job stays visible to pollers
pub const FAILURE_RETENTION: Duration = Duration::from_secs(10 * 60);

pub const INTERRUPTED_MESSAGE: &str = "Generation was interrupted";

const UPDATE_BUFFER: usize = 32;

/// Receives human-readable progress from a running job
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &str);
}

enum JobSlot {
    Running {
        progress: String,
        updates: broadcast::Sender<GenerationUpdate>,
    },
    Failed {
        error: String,
        at: Instant,
    },
}

/// What is currently known about a title's job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSnapshot {
    Running { progress: String },
    Failed { error: String },
}

/// Registry of in-flight review generations, at most one per title
pub struct JobTracker {
    slots: Mutex<HashMap<i64, JobSlot>>,
    failure_retention: Duration,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::with_retention(FAILURE_RETENTION)
    }
}

impl JobTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_retention(failure_retention: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            failure_retention,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<i64, JobSlot>> {
        // A panic while holding the lock cannot leave a slot half-written
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the title for a new job; `None` if one is already running
    pub fn begin(self: &Arc<Self>, tmdb_id: i64) -> Option<JobHandle> {
        let mut slots = self.slots();
        if matches!(slots.get(&tmdb_id), Some(JobSlot::Running { .. })) {
            return None;
        }

        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        slots.insert(
            tmdb_id,
            JobSlot::Running {
                progress: INITIAL_PROGRESS.to_string(),
                updates,
            },
        );
        tracing::debug!(tmdb_id, "Generation job registered");

        Some(JobHandle {
            tracker: Arc::clone(self),
            tmdb_id,
            finished: false,
        })
    }

    pub fn snapshot(&self, tmdb_id: i64) -> Option<JobSnapshot> {
        let mut slots = self.slots();
        match slots.get(&tmdb_id) {
            Some(JobSlot::Running { progress, .. }) => Some(JobSnapshot::Running {
                progress: progress.clone(),
            }),
            Some(JobSlot::Failed { error, at }) => {
                if at.elapsed() < self.failure_retention {
                    Some(JobSnapshot::Failed {
                        error: error.clone(),
                    })
                } else {
                    slots.remove(&tmdb_id);
                    None
                }
            }
            None => None,
        }
    }

    pub fn is_running(&self, tmdb_id: i64) -> bool {
        matches!(self.snapshot(tmdb_id), Some(JobSnapshot::Running { .. }))
    }

    /// Current progress plus a feed of later updates, while the job runs
    pub fn subscribe(
        &self,
        tmdb_id: i64,
    ) -> Option<(String, broadcast::Receiver<GenerationUpdate>)> {
        match self.slots().get(&tmdb_id) {
            Some(JobSlot::Running { progress, updates }) => {
                Some((progress.clone(), updates.subscribe()))
            }
            _ => None,
        }
    }

    fn report(&self, tmdb_id: i64, message: &str) {
        if let Some(JobSlot::Running { progress, updates }) = self.slots().get_mut(&tmdb_id) {
            *progress = message.to_string();
            // No subscribers is fine
            let _ = updates.send(GenerationUpdate::Generating {
                progress: message.to_string(),
            });
        }
    }

    fn finish(&self, tmdb_id: i64, update: GenerationUpdate) {
        let mut slots = self.slots();
        let previous = match &update {
            GenerationUpdate::Error { error } => slots.insert(
                tmdb_id,
                JobSlot::Failed {
                    error: error.clone(),
                    at: Instant::now(),
                },
            ),
            _ => slots.remove(&tmdb_id),
        };

        if let Some(JobSlot::Running { updates, .. }) = previous {
            let _ = updates.send(update);
        }
    }
}

/// Exclusive right to report on one title's job
///
/// Dropping the handle without completing or failing records an interruption.
pub struct JobHandle {
    tracker: Arc<JobTracker>,
    tmdb_id: i64,
    finished: bool,
}

impl JobHandle {
    pub fn tmdb_id(&self) -> i64 {
        self.tmdb_id
    }

    pub fn complete(mut self, movie: MovieWithReview) {
        self.finished = true;
        self.tracker.finish(
            self.tmdb_id,
            GenerationUpdate::Completed {
                movie: Box::new(movie),
            },
        );
    }

    pub fn fail(mut self, error: impl Into<String>) {
        self.finished = true;
        self.tracker.finish(
            self.tmdb_id,
            GenerationUpdate::Error {
                error: error.into(),
            },
        );
    }
}

impl ProgressReporter for JobHandle {
    fn report(&self, progress: &str) {
        self.tracker.report(self.tmdb_id, progress);
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(tmdb_id = self.tmdb_id, "Generation job dropped before finishing");
            self.tracker.finish(
                self.tmdb_id,
                GenerationUpdate::Error {
                    error: INTERRUPTED_MESSAGE.to_string(),
                },
            );
        }
    }
}
