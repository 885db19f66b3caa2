use std::sync::Arc;

use crate::{
    config::Config,
    db::{BattleStore, MovieStore, WatchlistStore},
    middleware::{RateLimiter, RateLimits},
    services::{
        providers::{ArticleReader, LanguageModel, MetadataProvider, ReviewSearch},
        BattleService, GenerationService, ReviewPipeline, RetryPolicy, SearchService,
        WatchlistService,
    },
};

/// Upstream services, already constructed
#[derive(Clone)]
pub struct Providers {
    pub metadata: Arc<dyn MetadataProvider>,
    pub search: Arc<dyn ReviewSearch>,
    pub reader: Arc<dyn ArticleReader>,
    pub llm: Arc<dyn LanguageModel>,
}

/// Tunables the handlers need at request time
#[derive(Debug, Clone)]
pub struct Settings {
    pub limits: RateLimits,
    pub watchlist_max_items: i64,
    pub ip_hash_salt: String,
    pub allowed_origins: Vec<String>,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: RateLimits {
                per_ip_per_hour: config.on_demand_per_ip_per_hour,
                per_ip_per_day: config.on_demand_per_ip_per_day,
                daily_generations: config.daily_generation_limit,
            },
            watchlist_max_items: config.watchlist_max_items,
            ip_hash_salt: config.ip_hash_salt.clone(),
            allowed_origins: config.origins(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub movies: Arc<dyn MovieStore>,
    pub generation: Arc<GenerationService>,
    pub search: Arc<SearchService>,
    pub battles: Arc<BattleService>,
    pub watchlist: Arc<WatchlistService>,
    pub limiter: Arc<RateLimiter>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wires services on top of one store implementing every persistence seam
    pub fn new<S>(store: Arc<S>, providers: Providers, settings: Settings) -> Self
    where
        S: MovieStore + BattleStore + WatchlistStore + 'static,
    {
        let movies: Arc<dyn MovieStore> = store.clone();
        let battles: Arc<dyn BattleStore> = store.clone();
        let watchlist: Arc<dyn WatchlistStore> = store;

        let pipeline = ReviewPipeline::new(
            movies.clone(),
            providers.metadata.clone(),
            providers.search,
            providers.reader,
            providers.llm.clone(),
        )
        .with_retry(settings.retry);

        Self {
            generation: Arc::new(GenerationService::new(movies.clone(), Arc::new(pipeline))),
            search: Arc::new(SearchService::new(
                movies.clone(),
                providers.metadata.clone(),
            )),
            battles: Arc::new(BattleService::new(
                movies.clone(),
                battles,
                providers.metadata,
                providers.llm,
            )),
            watchlist: Arc::new(WatchlistService::new(
                watchlist,
                settings.watchlist_max_items,
            )),
            limiter: Arc::new(RateLimiter::new(settings.limits)),
            movies,
            settings: Arc::new(settings),
        }
    }
}
