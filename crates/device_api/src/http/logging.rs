use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{error, info, warn, Instrument, Span};

/// Configuration for HTTP request logging
#[derive(Clone, Debug, Default)]
pub struct HttpLoggingConfig {
    /// Path prefixes that are never logged (e.g., "/health")
    pub ignored_paths: Vec<String>,
}

impl HttpLoggingConfig {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { ignored_paths }
    }

    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer for logging HTTP requests
#[derive(Clone)]
pub struct HttpLoggingLayer {
    config: HttpLoggingConfig,
}

impl HttpLoggingLayer {
    pub fn new(config: HttpLoggingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for HttpLoggingLayer {
    type Service = HttpLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpLoggingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

/// Service that logs method, path, status and duration of each request
#[derive(Clone)]
pub struct HttpLoggingService<S> {
    inner: S,
    config: HttpLoggingConfig,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for HttpLoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let should_ignore = self.config.should_ignore(&path);
        let start = Instant::now();
        let future = self.inner.call(req);

        let span = Span::current();

        Box::pin(
            async move {
                let result = future.await;

                if !should_ignore {
                    let duration = start.elapsed();

                    match &result {
                        Ok(response) => {
                            let status = response.status();
                            if status.is_server_error() {
                                warn!(
                                    method = %method,
                                    path = %path,
                                    http_status = %status.as_u16(),
                                    duration_ms = %duration.as_millis(),
                                    "{} {} - {}ms - {}",
                                    method,
                                    path,
                                    duration.as_millis(),
                                    status
                                );
                            } else {
                                info!(
                                    method = %method,
                                    path = %path,
                                    http_status = %status.as_u16(),
                                    duration_ms = %duration.as_millis(),
                                    "{} {} - {}ms - {}",
                                    method,
                                    path,
                                    duration.as_millis(),
                                    status
                                );
                            }
                        }
                        Err(e) => {
                            error!(
                                method = %method,
                                path = %path,
                                duration_ms = %duration.as_millis(),
                                error = %e,
                                "{} {} - {}ms - ERROR: {}",
                                method,
                                path,
                                duration.as_millis(),
                                e
                            );
                        }
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_should_ignore_prefix() {
        let config = HttpLoggingConfig::new(vec!["/health".to_string()]);
        assert!(config.should_ignore("/health"));
        assert!(config.should_ignore("/healthz"));
        assert!(!config.should_ignore("/devices"));
        assert!(!HttpLoggingConfig::default().should_ignore("/health"));
    }

    #[tokio::test]
    async fn test_layer_passes_response_through() {
        let router = Router::new()
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(HttpLoggingLayer::new(HttpLoggingConfig::default()));

        let resp = router
            .oneshot(Request::builder().uri("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }
}
