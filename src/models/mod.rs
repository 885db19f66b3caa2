pub mod battle;
pub mod generation;
pub mod movie;
pub mod review;
pub mod search;
pub mod watchlist;

pub use battle::{BattleResult, Contender};
pub use generation::{GenerationMode, GenerationUpdate, StartResponse, StartStatus, INITIAL_PROGRESS};
pub use movie::{
    Genre, MediaType, Movie, MovieCategory, MovieListQuery, MovieWithReview, NewMovie,
    PaginatedMovies, HIDDEN_GEM_POPULARITY, TMDB_IMAGE_BASE,
};
pub use review::{Confidence, Review, ReviewDraft, Verdict};
pub use search::{SearchHit, SearchResponse, MAX_TMDB_RESULTS};
pub use watchlist::{AddWatchlistRequest, WatchlistEntry};
