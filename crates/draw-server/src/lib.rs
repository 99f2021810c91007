// # draw-server
//
// HTTP surface of the draw-relay service.
//
// | route           | poll mode        | push mode                 |
// |-----------------|------------------|---------------------------|
// | `GET /`         | banner           | banner                    |
// | `GET /health`   | status, counters | status, counters, mirror  |
// | `GET /api/live` | live slot        | newest history entry      |
// | `POST /api/live`| 405              | validate, accept, mirror  |
// | `GET /api/latest` / `GET /api/history` | read-only views         |
//
// Handlers only read from the stores held in `AppState`; the poll engine
// and the ingestor own all writes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::get,
};
use draw_core::IngestMode;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use state::AppState;

use routes::{
    banner_handler, health_handler, history_handler, latest_handler, live_handler, push_handler,
};

/// Default request body limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;

/// Build the router with the default body limit
pub fn router(state: AppState) -> Router {
    router_with_limit(state, DEFAULT_MAX_BODY_BYTES)
}

/// Build the router
///
/// `POST /api/live` is only mounted in push mode; in poll mode axum answers
/// it with 405.
pub fn router_with_limit(state: AppState, max_body_bytes: usize) -> Router {
    let live_route = match state.mode {
        IngestMode::Push => get(live_handler).post(push_handler),
        IngestMode::Poll => get(live_handler),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(banner_handler))
        .route("/health", get(health_handler))
        .route("/api/live", live_route)
        .route("/api/latest", get(latest_handler))
        .route("/api/history", get(history_handler))
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                )),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// The service's HTTP listener
pub struct QueryServer {
    router: Router,
    port: u16,
}

impl QueryServer {
    pub fn new(state: AppState, port: u16, max_body_bytes: usize) -> Self {
        Self {
            router: router_with_limit(state, max_body_bytes),
            port,
        }
    }

    /// Serve until `shutdown` completes
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        info!("Query server listening on http://{}", listener.local_addr()?);

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("Query server stopped");
        Ok(())
    }
}
