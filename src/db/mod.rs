pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use redis::{Cache, CacheKey, CacheWriterHandle};
pub use store::{BattleStore, MovieStore, WatchlistStore};
