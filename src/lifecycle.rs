//! Startup and shutdown ordering.
//!
//! ```text
//! Starting -> Recovering -> Subscribing -> Serving -> Draining -> Stopped
//! ```
//!
//! The store is connected and replayed into the cache before the bus
//! subscription exists, and both happen before the HTTP listener binds. On
//! shutdown, intake stops first, in-flight ingests finish, then the store
//! and the bus are closed in that order.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::Consumer;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ingest::IngestService;
use crate::application::recovery::{restore_cache, RecoveryError};
use crate::cache::OrderCache;
use crate::config::{AppConfig, ConfigError};
use crate::infrastructure::order_repo::DieselOrderStore;
use crate::infrastructure::subscriber::{self, OrderSubscriber};
use crate::{build_server, create_pool, run_migrations, MigrationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Recovering = 1,
    Subscribing = 2,
    Serving = 3,
    Draining = 4,
    Stopped = 5,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Starting,
            1 => Phase::Recovering,
            2 => Phase::Subscribing,
            3 => Phase::Serving,
            4 => Phase::Draining,
            _ => Phase::Stopped,
        }
    }
}

#[derive(Debug, Error)]
#[error("Cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: Phase,
    pub to: Phase,
}

/// Current phase. Only moves forward, one step at a time.
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn advance(&self, to: Phase) -> Result<(), TransitionError> {
        let expected = (to as u8).checked_sub(1).ok_or(TransitionError {
            from: self.phase(),
            to,
        })?;
        self.phase
            .compare_exchange(expected, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| log::info!("Lifecycle: {:?}", to))
            .map_err(|current| TransitionError {
                from: Phase::from_u8(current),
                to,
            })
    }
}

/// Anything that stops the service from starting. All of these are fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),
    #[error("Failed to bind HTTP listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Load configuration from the environment and run until a shutdown signal.
pub async fn run_from_env() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    run(config, Arc::new(Lifecycle::new())).await
}

pub async fn run(config: AppConfig, lifecycle: Arc<Lifecycle>) -> Result<(), StartupError> {
    log::info!("Connecting to the order store");
    let store_url = config.store.database_url();
    let store_timeout = config.store.timeout;
    let pool = tokio::task::spawn_blocking(move || {
        let pool = create_pool(&store_url, store_timeout)
            .map_err(|e| StartupError::Connection(format!("store: {e}")))?;
        run_migrations(&pool)?;
        Ok::<_, StartupError>(pool)
    })
    .await??;
    let store = DieselOrderStore::new(pool);
    let cache = Arc::new(OrderCache::new());

    lifecycle.advance(Phase::Recovering)?;
    {
        let store = store.clone();
        let cache = Arc::clone(&cache);
        tokio::task::spawn_blocking(move || restore_cache(&store, &cache)).await??;
    }

    lifecycle.advance(Phase::Subscribing)?;
    let bus = config.bus.clone();
    let consumer = tokio::task::spawn_blocking(move || subscriber::connect(&bus))
        .await?
        .map_err(|e| StartupError::Connection(format!("bus: {e}")))?;
    let consumer = Arc::new(consumer);
    let pipeline = Arc::new(IngestService::new(store.clone(), Arc::clone(&cache)));
    let intake = OrderSubscriber::new(Arc::clone(&consumer), pipeline, &config.bus);

    let server = build_server(Arc::clone(&cache), &config.http_addr, config.shutdown_grace)
        .map_err(StartupError::Bind)?;
    let server_handle = server.handle();

    lifecycle.advance(Phase::Serving)?;
    log::info!("Serving lookups on http://{}", config.http_addr);
    let shutdown = CancellationToken::new();
    let intake = tokio::spawn(intake.run(shutdown.clone()));
    let mut http = tokio::spawn(server);

    tokio::select! {
        _ = shutdown_signal() => log::info!("Shutdown signal received"),
        result = &mut http => log::error!("HTTP server exited unexpectedly: {:?}", result),
    }

    lifecycle.advance(Phase::Draining)?;
    shutdown.cancel();
    server_handle.stop(true).await;
    drain_intake(intake, config.shutdown_grace).await;

    lifecycle.advance(Phase::Stopped)?;
    drop(store);
    log::info!("Order store released");
    consumer.unsubscribe();
    drop(consumer);
    log::info!("Bus subscription closed");
    Ok(())
}

/// Wait up to `grace` for the subscriber to drain, then abort it and its
/// workers. Returns whether it drained in time.
async fn drain_intake(mut intake: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut intake).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("Subscriber task failed: {}", e);
            false
        }
        Err(_) => {
            log::warn!(
                "In-flight messages did not finish within {:?}; they will be redelivered",
                grace
            );
            intake.abort();
            let _ = intake.await;
            false
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
