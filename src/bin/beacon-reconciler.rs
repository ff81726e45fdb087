//! # Beacon Reconciler
//!
//! Runs the lifecycle reconciler against PostgreSQL and Redis until Ctrl-C.
//! Failing to reach either backend at startup exits non-zero.

use anyhow::Context;
use beacon_core::cache::providers::connect as connect_redis;
use beacon_core::cache::{
    CacheKeys, NotificationCache, RedisNotificationCache, RedisRemoteConfigCache,
    RemoteConfigCache, ScriptRegistry,
};
use beacon_core::config::ConfigManager;
use beacon_core::database::{connection, PgStore};
use beacon_core::logging::init_structured_logging;
use beacon_core::{ExpiryPolicy, LifecycleReconciler};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "beacon-reconciler")]
#[command(about = "Keep remote config and notification caches consistent with the store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/beacon.toml if present)
    #[arg(short, long, env = "BEACON_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Apply database migrations before starting
    #[arg(long)]
    migrate: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = match cli.config.as_deref() {
        Some(path) => ConfigManager::load_from(Some(path), true, true),
        None => ConfigManager::load(),
    }
    .context("loading configuration")?;
    let config = manager.config();

    init_structured_logging(&config.logging);

    let pool = connection::connect(&config.database)
        .await
        .context("connecting to PostgreSQL")?;
    anyhow::ensure!(
        connection::health_check(&pool)
            .await
            .context("checking PostgreSQL")?,
        "PostgreSQL health check failed"
    );
    if cli.migrate {
        connection::run_migrations(&pool)
            .await
            .context("running migrations")?;
    }

    let redis = connect_redis(&config.redis)
        .await
        .context("connecting to Redis")?;
    let scripts = Arc::new(ScriptRegistry::new());
    let keys = CacheKeys::new(config.redis.key_prefix.clone());

    let notifications =
        RedisNotificationCache::new(redis.clone(), Arc::clone(&scripts), keys.clone());
    let configs = RedisRemoteConfigCache::new(
        redis,
        Arc::clone(&scripts),
        keys,
        config.cache.config_data_ttl(),
    );
    notifications
        .load_scripts()
        .await
        .context("loading notification scripts")?;
    configs
        .load_scripts()
        .await
        .context("loading remote config scripts")?;
    anyhow::ensure!(
        configs.health_check().await.context("checking Redis")?,
        "Redis health check failed"
    );

    let store = Arc::new(PgStore::new(pool));
    let reconciler = LifecycleReconciler::new(
        Arc::clone(&store),
        Arc::new(notifications),
        Arc::new(configs),
        config.reconciler.clone(),
        ExpiryPolicy::new(config.cache.max_feed_ttl()),
    );

    if cli.once {
        let report = reconciler.run_cycle(Utc::now()).await;
        info!(?report, "Single reconcile cycle finished");
    } else {
        reconciler.run_until(shutdown_signal()).await;
    }

    store.pool().close().await;
    info!("Beacon reconciler stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
    }
}
