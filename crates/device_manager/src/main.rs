mod config;

use crate::config::ServiceConfig;
use anyhow::Context;
use common::postgres::{PostgresClient, PostgresDeviceRepository};
use common::telemetry::{init_telemetry, TelemetryConfig};
use device_api::domain::DeviceService;
use device_api::http::{HttpLoggingConfig, HttpServerConfig};
use device_api::DeviceApi;
use goose::MigrationRunner;
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: config.service_name.clone(),
        log_level: config.log_level.clone(),
        json: config.log_json,
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(service_name = %config.service_name, "Starting device-manager service");

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let device_repository = Arc::new(PostgresDeviceRepository::new(postgres_client.clone()));
    let device_service = Arc::new(DeviceService::new(device_repository));

    let http_config = HttpServerConfig {
        host: config.http_host.clone(),
        port: config.http_port,
        request_timeout: Duration::from_secs(config.http_timeout_secs),
        logging_config: HttpLoggingConfig::new(config.ignored_paths()),
    };
    let device_api = DeviceApi::new(device_service, http_config);

    let result = Runner::new()
        .with_named_process("device_api", device_api.into_runner_process())
        .with_closer(move || async move {
            info!("Closing PostgreSQL pool");
            postgres_client.close();
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .run()
        .await;

    if let Err(e) = result {
        error!("Service stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    let postgres_config = config.postgres();

    if config.run_migrations {
        info!("Running PostgreSQL migrations...");
        MigrationRunner::postgres(
            config.postgres_goose_binary_path.clone(),
            config.postgres_migrations_dir.clone(),
            postgres_config.dsn(),
        )
        .run_migrations()
        .await
        .context("failed to run migrations")?;
    } else {
        debug!("Skipping migrations");
    }

    let client = PostgresClient::new(&postgres_config)?;
    client
        .ping()
        .await
        .context("failed to reach PostgreSQL")?;
    info!(
        host = %postgres_config.host,
        database = %postgres_config.database,
        "PostgreSQL connection pool ready"
    );
    Ok(client)
}
