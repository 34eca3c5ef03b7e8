use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use igdb::{CatalogSource, IgdbClient};
use mq::{JobQueue, KvStore, RedisJobQueue, RedisKv};
use server::build_router;
use server::config::AppConfig;
use server::consumers::{CatalogWriter, run_catalog_writer, run_stale_job_detector};
use server::database::init_db;
use server::search::SearchService;
use server::similar::{SimilarGamesStaging, SimilarGamesWorker, run_similar_games_worker};
use server::state::AppState;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let redis = mq::connect(&config.mq.url)
        .await
        .context("failed to connect to Redis")?;
    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::new(redis.clone()));
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(
        redis,
        config.mq.queue_name.clone(),
        config.mq.max_attempts,
        config.mq.ledger_limit,
    ));

    let db = init_db(&config.database)
        .await
        .context("failed to connect to the database")?;

    if !config.igdb.has_credentials() {
        warn!("IGDB credentials are not configured; upstream lookups will fail");
    }
    let source: Arc<dyn CatalogSource> = Arc::new(IgdbClient::new(config.igdb.clone(), kv.clone())?);
    let staging = SimilarGamesStaging::new(kv.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let writer = CatalogWriter::new(db.clone(), queue.clone(), kv.clone(), staging.clone());
    tasks.push(tokio::spawn(run_catalog_writer(
        writer,
        config.writer.clone(),
        shutdown_rx.clone(),
    )));

    if config.similar_games.enabled {
        let worker = SimilarGamesWorker::new(
            db.clone(),
            queue.clone(),
            staging.clone(),
            source.clone(),
            config.similar_games.clone(),
        );
        tasks.push(tokio::spawn(run_similar_games_worker(
            worker,
            shutdown_rx.clone(),
        )));
    }

    if config.stale_jobs.enabled {
        tasks.push(tokio::spawn(run_stale_job_detector(
            queue.clone(),
            config.stale_jobs.clone(),
            shutdown_rx.clone(),
        )));
    }

    let state = AppState {
        search: SearchService::new(
            db,
            kv,
            queue.clone(),
            source,
            staging.clone(),
            config.search.clone(),
        ),
        queue,
        staging,
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
