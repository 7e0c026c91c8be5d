//! Network module with deferred startup lifecycle.
//!
//! `new()` wires the executor and data source, `start()` binds the TCP
//! listener, and `serve()` accepts requests until shutdown is signalled.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use folio_core::Document;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, items_handler, liveness_handler, plan_handler, readiness_handler, AppState,
};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::executor::PaginatedQueryExecutor;
use crate::traits::DataSourceAdapter;

/// Serves one paginated collection over HTTP.
///
/// 1. `new()` allocates the shutdown controller
/// 2. `start()` binds the listener
/// 3. `serve()` accepts requests, then drains in-flight queries
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    executor: Arc<PaginatedQueryExecutor>,
    source: Arc<dyn DataSourceAdapter<Document>>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        executor: Arc<PaginatedQueryExecutor>,
        source: Arc<dyn DataSourceAdapter<Document>>,
    ) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            executor,
            source,
        }
    }

    /// Shared shutdown controller, for health checks or external shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router.
    ///
    /// Routes:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness check
    /// - `GET /health/ready` -- readiness check
    /// - `GET /items` -- one page of the collection
    /// - `GET /items/plan` -- the query plan for the same parameters
    pub fn build_router(&self) -> Router {
        let state = AppState {
            executor: Arc::clone(&self.executor),
            source: Arc::clone(&self.source),
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };

        let routes = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/items", get(items_handler))
            .route("/items/plan", get(plan_handler));
        with_http_layers(routes, &self.config).with_state(state)
    }

    /// Binds the TCP listener and returns the bound port (OS-assigned when
    /// the configured port is 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// Once `shutdown` resolves the server stops accepting connections and
    /// reports `Draining`. Queries still running `drain_timeout` later are
    /// cancelled and answered with `503`, so this returns shortly after the
    /// drain window even when a data source never responds.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, or if the server
    /// hits a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let controller = self.shutdown;
        let drain_timeout = self.config.drain_timeout;

        let signalled = CancellationToken::new();
        let drain_deadline = tokio::spawn(cancel_after_drain(
            Arc::clone(&controller),
            signalled.clone(),
            drain_timeout,
        ));
        let shutdown = async move {
            shutdown.await;
            signalled.cancel();
        };

        controller.set_ready();
        info!("serving paginated queries");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;
        drain_deadline.abort();
        // Wait for the abort so the deadline task cannot touch health state below.
        let _ = drain_deadline.await;
        served?;

        controller.trigger_shutdown();
        let drained = controller.wait_for_drain(drain_timeout).await;
        if drained && !controller.queries_cancelled() {
            info!("all queries drained");
        } else {
            warn!(
                remaining = controller.in_flight_count(),
                "drain timeout expired, remaining queries cancelled"
            );
        }
        Ok(())
    }
}

/// Moves to `Draining` when `signalled` fires, then cancels whatever is still
/// running once `drain_timeout` has passed.
async fn cancel_after_drain(
    controller: Arc<ShutdownController>,
    signalled: CancellationToken,
    drain_timeout: Duration,
) {
    signalled.cancelled().await;
    controller.trigger_shutdown();
    let in_flight = controller.in_flight_count();
    if in_flight > 0 {
        info!(in_flight, "draining in-flight queries");
    }
    tokio::time::sleep(drain_timeout).await;
    if controller.in_flight_count() > 0 {
        controller.cancel_queries();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use folio_core::{FieldDescriptor, FilterSpec, QueryConfig, Schema, SortSpec};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::network::HealthState;
    use crate::storage::MemorySource;

    fn module_with(
        source: Arc<dyn DataSourceAdapter<Document>>,
        drain_timeout: Duration,
    ) -> NetworkModule {
        let schema = Arc::new(Schema::new([FieldDescriptor::string("id")], "id").unwrap());
        let executor = Arc::new(PaginatedQueryExecutor::new(schema, QueryConfig::default()));
        NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".into(),
                drain_timeout,
                ..NetworkConfig::default()
            },
            executor,
            source,
        )
    }

    fn module() -> NetworkModule {
        let schema = Schema::new([FieldDescriptor::string("id")], "id").unwrap();
        let source = Arc::new(MemorySource::<Document>::for_schema(&schema));
        module_with(source, NetworkConfig::default().drain_timeout)
    }

    /// Source whose calls never complete.
    struct Stalled;

    #[async_trait]
    impl DataSourceAdapter<Document> for Stalled {
        async fn fetch(
            &self,
            _filter: &FilterSpec,
            _sort: &SortSpec,
            _skip: u64,
            _limit: u64,
        ) -> anyhow::Result<Vec<Document>> {
            std::future::pending().await
        }

        async fn count(&self, _filter: &FilterSpec) -> anyhow::Result<u64> {
            std::future::pending().await
        }
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module();
        assert!(module.listener.is_none());
        assert_eq!(
            module.shutdown_controller().health_state(),
            HealthState::Starting
        );
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = module();
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module()
            .serve(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn serve_stops_after_shutdown_signal() {
        let mut module = module();
        module.start().await.unwrap();
        let controller = module.shutdown_controller();

        module.serve(async {}).await.unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn drain_timeout_cancels_a_stalled_query() {
        let mut module = module_with(Arc::new(Stalled), Duration::from_millis(100));
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = stopped.await;
        }));

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            stream
                .write_all(b"GET /items HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.in_flight_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("request should reach the stalled source");
        stop.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve should return soon after the drain timeout")
            .unwrap()
            .unwrap();
        assert!(controller.queries_cancelled());
        assert_eq!(controller.in_flight_count(), 0);
        assert_eq!(controller.health_state(), HealthState::Stopped);

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 503"));
        assert!(response.contains("cancelled"));
    }
}
