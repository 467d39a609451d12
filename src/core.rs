use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app::AppContext;
use crate::health;
use crate::http::{api_routes, payload_guard};

/// Request-id middleware: one UUID per request, propagated to responses.
#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Main application structure for fakturo.
pub struct App {
    context: AppContext,
}

impl App {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    /// Build the routed application with its middleware stack applied.
    ///
    /// Middleware order (outer to inner): tracing, request ids, payload
    /// guard (declared size), body limit (measured size), routes.
    pub fn router(&self) -> Router {
        let max_body_bytes = self.context.config.server.max_body_bytes;

        Router::new()
            .merge(api_routes())
            .route("/health", get(health::health_handler))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(middleware::from_fn_with_state(
                self.context.clone(),
                payload_guard,
            ))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .with_state(self.context.clone())
    }

    /// Start the application server with graceful shutdown.
    pub async fn serve(self) -> std::result::Result<(), std::io::Error> {
        let addr = self
            .context
            .config
            .server
            .addr()
            .expect("invalid server address in config");

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight connections a grace period to close
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
