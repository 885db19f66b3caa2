pub mod generation;
pub mod jobs;
pub mod opinion_grep;
pub mod pipeline;
pub mod providers;
pub mod retry;
pub mod search;
pub mod versus;
pub mod watchlist;

pub use generation::{GenerationService, UpdateFeed};
pub use jobs::{JobHandle, JobSnapshot, JobTracker, ProgressReporter};
pub use pipeline::{GenerationRequest, ReviewGenerator, ReviewPipeline};
pub use retry::RetryPolicy;
pub use search::SearchService;
pub use versus::BattleService;
pub use watchlist::WatchlistService;
