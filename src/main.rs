use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use worth_the_watch::{
    config::Config,
    db::{create_pool, run_migrations, Cache, MemoryStore, PgStore},
    logging,
    routes::{create_router, AppState, Providers, Settings},
    services::providers::{FailoverModel, JinaReader, SerperSearch, TmdbClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("info,tower_http=info,sqlx=warn");

    let config = Config::from_env()?;
    let (cache, cache_writer) = Cache::connect(&config.redis_url).await?;

    let providers = Providers {
        metadata: Arc::new(TmdbClient::new(
            cache,
            config.tmdb_base_url.clone(),
            config.tmdb_api_key.clone(),
        )),
        search: Arc::new(SerperSearch::new(
            config.serper_url.clone(),
            config.serper_api_key.clone(),
            config.serper_api_key_fallback.clone(),
        )),
        reader: Arc::new(JinaReader::new(
            config.jina_base_url.clone(),
            config.jina_api_key.clone(),
        )),
        llm: Arc::new(FailoverModel::from_config(&config)?),
    };
    let settings = Settings::from_config(&config);

    let state = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        AppState::new(Arc::new(MemoryStore::new()), providers, settings)
    } else {
        let pool = create_pool(&config.database_url).await?;
        run_migrations(&pool).await?;
        AppState::new(Arc::new(PgStore::new(pool)), providers, settings)
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cache_writer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
