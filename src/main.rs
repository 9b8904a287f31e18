use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use chain_view::config::{load_config, watcher::ConfigWatcher, LogFormat};
use chain_view::http::{AdminServer, AppState};
use chain_view::lifecycle::{signals, start_pools, Readiness, Shutdown};
use chain_view::observability::metrics::UPKEEP_INTERVAL;
use chain_view::observability::{init_logging, MetricsRegistry};
use chain_view::pool::{PoolFactory, PoolRegistry};

#[derive(Parser)]
#[command(name = "chain-view")]
#[command(about = "Polls multi-chain RPC endpoints with rate limiting, retries and circuit breaking", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/chain-view.toml")]
    config: PathBuf,

    /// Override the configured log format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(format) = args.log_format {
        config.server.logging.format = format.into();
    }
    let log_level = init_logging(&config.server.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        chains = config.chains.len(),
        "chain-view starting"
    );

    let metrics = Arc::new(MetricsRegistry::new()?);
    let factory = PoolFactory::new(config.global_settings.clone(), metrics.clone())?;
    let set = factory.create_pools(&config.chains);
    if set.pools.is_empty() {
        tracing::error!(rejected = set.errors.len(), "No valid chain configured, exiting");
        return Err("no endpoint pool could be created".into());
    }
    if !set.errors.is_empty() {
        tracing::warn!(
            rejected = set.errors.len(),
            running = set.pools.len(),
            "Some chains were rejected"
        );
    }

    let shutdown = Shutdown::new();
    let registry = Arc::new(PoolRegistry::new());
    let readiness = Arc::new(Readiness::new());

    let upkeep = metrics.spawn_upkeep(UPKEEP_INTERVAL, shutdown.token());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = AdminServer::new(AppState {
        registry: registry.clone(),
        metrics,
        readiness: readiness.clone(),
        log_level: Some(log_level),
    });
    let mut server_task = tokio::spawn(server.run(listener, shutdown.token()));

    let tasks = start_pools(
        set.pools,
        &registry,
        &readiness,
        &shutdown.token(),
        config.global_settings.max_workers,
    );

    // Dropping the watcher stops it, so keep it until exit.
    let _watcher = if args.no_watch {
        None
    } else {
        watch_config(&args.config, registry.clone(), shutdown.token())
    };

    let server_exited = tokio::select! {
        _ = signals::wait_for_signal() => None,
        result = &mut server_task => Some(result),
    };
    if let Some(result) = &server_exited {
        match result {
            Ok(Ok(())) => tracing::error!("Admin server exited unexpectedly"),
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin server task failed"),
        }
    }

    shutdown.trigger();
    readiness.set_running_pools(0);

    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let stop_pools = join_all(tasks.into_iter().map(|task| task.shutdown()));
    if tokio::time::timeout(grace, stop_pools).await.is_err() {
        tracing::warn!(grace = ?grace, "Pools did not stop within the grace period");
    }
    if server_exited.is_none() && tokio::time::timeout(grace, server_task).await.is_err() {
        tracing::warn!(grace = ?grace, "Admin server did not stop within the grace period");
    }

    let _ = upkeep.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Feed every valid new configuration into the running pools.
fn watch_config(
    path: &std::path::Path,
    registry: Arc<PoolRegistry>,
    cancel: CancellationToken,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
            return None;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Some(config) => {
                        let rejected = registry.reload(&config.chains);
                        tracing::info!(rejected = rejected.len(), "Configuration reload applied");
                    }
                    None => break,
                },
            }
        }
    });

    Some(watcher)
}
