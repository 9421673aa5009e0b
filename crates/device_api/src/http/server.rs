use crate::http::{ApiError, HttpLoggingConfig, HttpLoggingLayer};
use anyhow::Context;
use axum::http::StatusCode;
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Requests still running after this long are answered with 408 and
    /// their handler future is dropped.
    pub request_timeout: Duration,
    /// Logging middleware configuration.
    pub logging_config: HttpLoggingConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            logging_config: HttpLoggingConfig::default(),
        }
    }
}

/// Wraps `router` with panic recovery, the request timeout and request logging
pub fn with_middleware(router: Router, config: &HttpServerConfig) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(map_response(timeout_response))
        .layer(HttpLoggingLayer::new(config.logging_config.clone()))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!(panic = %detail, "Handler panicked");

    ApiError::internal("internal server error").into_response()
}

// TimeoutLayer answers with an empty 408
async fn timeout_response(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::request_timeout().into_response();
    }
    response
}

/// Run the HTTP server until `cancellation_token` is cancelled
///
/// In-flight requests are allowed to finish once shutdown starts.
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid server address {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Starting HTTP server on {}", addr);

    let app = with_middleware(router, &config);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            info!("HTTP server shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped gracefully");
    Ok(())
}
