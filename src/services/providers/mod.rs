//! Upstream services the review pipeline depends on.
//!
//! Each concern sits behind an `async_trait` seam so the pipeline, the
//! battle service and the tests can swap in fakes.

pub mod llm;
pub mod reader;
pub mod serper;
pub mod tmdb;

pub use llm::{Completion, FailoverModel, LanguageModel, OpenAiCompatible, Prompt};
pub use reader::{read_many, ArticleReader, JinaReader};
pub use serper::{ReviewSearch, SerperSearch, WebResult};
pub use tmdb::{MetadataProvider, TmdbClient};
