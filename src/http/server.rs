//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the counter and replay stores the configuration asks for
//! - Create the Axum router: request ID, trace, timeout, admission
//! - Apply hot-reloaded configurations to the running pipeline
//! - Run the housekeeper alongside the listener
//!
//! # Design Decisions
//! - A Redis backend that cannot be reached at startup degrades to the
//!   in-process stores; the gatekeeper never refuses to start over it
//! - Storage and listener changes need a restart; a reload only swaps the
//!   admission policy

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{middleware, routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::{admission_middleware, AdmissionPipeline, AdmissionPolicy};
use crate::backend;
use crate::clock::{Clock, SystemClock};
use crate::config::schema::{GatekeeperConfig, StorageKind};
use crate::config::validation::{validate_config, ValidationError};
use crate::http::downstream::admitted_handler;
use crate::http::request::request_id_layer;
use crate::lifecycle::{sweep_interval, Housekeeper, Shutdown};
use crate::limiter::fallback::FallbackCounterStore;
use crate::limiter::redis::RedisCounterStore;
use crate::limiter::{CounterStore, MemoryCounterStore, RateLimiter};
use crate::replay::{FallbackReplayStore, MemoryReplayStore, RedisReplayStore, ReplayStore};
use crate::signature::{AesGcmEnvelope, SignatureVerifier};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The backends behind the limiter and the verifier.
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<dyn CounterStore>,
    pub replay: Arc<dyn ReplayStore>,
}

impl Stores {
    /// In-process stores only.
    pub fn memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Arc::new(MemoryCounterStore::new()),
            replay: Arc::new(MemoryReplayStore::new(clock)),
        }
    }

    /// Build the stores named in the configuration.
    pub async fn from_config(config: &GatekeeperConfig, clock: Arc<dyn Clock>) -> Self {
        let wants_redis = config.rate_limit.storage == StorageKind::Redis
            || config.signature.storage == StorageKind::Redis;
        let mut stores = Self::memory(clock.clone());
        if !wants_redis {
            return stores;
        }

        let client = match backend::connect(&config.redis, CONNECT_TIMEOUT).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(
                    url = %config.redis.url,
                    error = %e,
                    "Redis unreachable at startup, using in-process stores"
                );
                return stores;
            }
        };

        let call_timeout = Duration::from_millis(config.redis.timeout_ms);
        let prefix = config.redis.key_prefix.as_str();

        if config.rate_limit.storage == StorageKind::Redis {
            let shared = Arc::new(RedisCounterStore::new(client.clone(), prefix));
            stores.counters = Arc::new(FallbackCounterStore::new(shared, call_timeout));
        }
        if config.signature.storage == StorageKind::Redis {
            let shared = Arc::new(RedisReplayStore::new(client, prefix, clock.clone()));
            stores.replay = Arc::new(FallbackReplayStore::new(shared, clock, call_timeout));
        }

        tracing::info!(
            counters = stores.counters.name(),
            replay = stores.replay.name(),
            "Stores ready"
        );
        stores
    }
}

/// Shared state for the admin API and the reload loop.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AdmissionPipeline>,
    pub config: Arc<ArcSwap<GatekeeperConfig>>,
    pub housekeeper: Housekeeper,
}

impl AppState {
    /// Validate `config` and make it the active one.
    pub fn apply_config(&self, config: GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
        if let Err(errors) = validate_config(&config) {
            for error in &errors {
                tracing::error!(error = %error, "Rejected reloaded configuration");
            }
            return Err(errors);
        }

        let current = self.config.load();
        if current.rate_limit.storage != config.rate_limit.storage
            || current.signature.storage != config.signature.storage
            || current.listener.bind_address != config.listener.bind_address
        {
            tracing::warn!("Storage or listener changes take effect after a restart");
        }

        self.pipeline.update_policy(AdmissionPolicy::from_config(&config));
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
        Ok(())
    }

    /// Apply configurations from `reloads` until the channel closes or
    /// `shutdown` fires. Rejected configurations leave the current one live.
    pub async fn apply_reloads(
        self,
        mut reloads: mpsc::UnboundedReceiver<GatekeeperConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                update = reloads.recv() => match update {
                    Some(config) => {
                        if let Err(errors) = self.apply_config(config) {
                            tracing::debug!(count = errors.len(), "Keeping previous configuration");
                        }
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
    }
}

/// HTTP server guarding the placeholder downstream.
pub struct GatekeeperServer {
    router: Router,
    state: AppState,
}

impl GatekeeperServer {
    /// Build stores from the configuration and wire everything up.
    pub async fn new(config: GatekeeperConfig) -> Self {
        let clock = SystemClock::shared();
        let stores = Stores::from_config(&config, clock.clone()).await;
        Self::with_stores(config, stores, clock)
    }

    pub fn with_stores(config: GatekeeperConfig, stores: Stores, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::new(stores.counters, clock.clone());
        let verifier = SignatureVerifier::new(stores.replay.clone(), Arc::new(AesGcmEnvelope), clock);
        let pipeline = Arc::new(AdmissionPipeline::new(
            AdmissionPolicy::from_config(&config),
            limiter.clone(),
            verifier,
        ));
        let housekeeper = Housekeeper::new(stores.replay, limiter, sweep_interval(&config));

        let router = build_router(&config, pipeline.clone());
        let state = AppState {
            pipeline,
            config: Arc::new(ArcSwap::from_pointee(config)),
            housekeeper,
        };
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` fires. Configurations arriving on `reloads`
    /// are validated and swapped in.
    pub async fn run(
        self,
        listener: TcpListener,
        reloads: mpsc::UnboundedReceiver<GatekeeperConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gatekeeper listening");

        tokio::spawn(self.state.housekeeper.clone().run(shutdown.subscribe()));
        tokio::spawn(self.state.clone().apply_reloads(reloads, shutdown.subscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("Gatekeeper stopped");
        Ok(())
    }
}

/// Router with the admission middleware in front of every path.
#[allow(deprecated)]
pub fn build_router(config: &GatekeeperConfig, pipeline: Arc<AdmissionPipeline>) -> Router {
    Router::new()
        .route("/", any(admitted_handler))
        .route("/{*path}", any(admitted_handler))
        .layer(middleware::from_fn_with_state(pipeline, admission_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )))
        .layer(request_id_layer())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn server(config: GatekeeperConfig) -> GatekeeperServer {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_unix_secs(1_700_000_000));
        GatekeeperServer::with_stores(config, Stores::memory(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_memory_stores_without_redis() {
        let stores = Stores::from_config(&GatekeeperConfig::default(), SystemClock::shared()).await;
        assert_eq!(stores.counters.name(), "memory");
        assert_eq!(stores.replay.name(), "memory");
    }

    #[test]
    fn test_apply_config_swaps_policy() {
        let server = server(GatekeeperConfig::default());
        let mut config = GatekeeperConfig::default();
        config.rate_limit.points = 7;

        server.state().apply_config(config).unwrap();
        assert_eq!(server.state().config.load().rate_limit.points, 7);
        assert_eq!(
            server.state().pipeline.policy().rules.default_rule().points,
            7
        );
    }

    #[test]
    fn test_apply_config_rejects_invalid() {
        let server = server(GatekeeperConfig::default());
        let mut config = GatekeeperConfig::default();
        config.rate_limit.points = 0;

        assert!(server.state().apply_config(config).is_err());
        assert_eq!(server.state().config.load().rate_limit.points, 100);
        assert_eq!(
            server.state().pipeline.policy().rules.default_rule().points,
            100
        );
    }

    #[tokio::test]
    async fn test_reload_loop_skips_rejected_configs() {
        let server = server(GatekeeperConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop, stop_rx) = broadcast::channel(1);
        let task = tokio::spawn(server.state().clone().apply_reloads(rx, stop_rx));

        let mut invalid = GatekeeperConfig::default();
        invalid.rate_limit.points = 0;
        let mut valid = GatekeeperConfig::default();
        valid.rate_limit.points = 7;
        tx.send(invalid).unwrap();
        tx.send(valid).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reload loop did not finish")
            .unwrap();
        assert_eq!(server.state().config.load().rate_limit.points, 7);
    }
}
