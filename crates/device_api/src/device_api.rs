use crate::domain::DeviceService;
use crate::http::{device_routes, run_http_server, HttpServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The device HTTP API as a runner process
pub struct DeviceApi {
    service: Arc<DeviceService>,
    config: HttpServerConfig,
}

impl DeviceApi {
    pub fn new(service: Arc<DeviceService>, config: HttpServerConfig) -> Self {
        debug!("Initializing device API module");
        Self { service, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_http_server(self.config, device_routes(self.service), ctx).await
            })
        }
    }
}
