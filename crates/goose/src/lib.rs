use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Migration runner that drives the goose CLI.
///
/// The goose binary is spawned as a subprocess with
/// `goose -dir {migrations_dir} {driver} {dsn} up`.
pub struct MigrationRunner {
    /// Path to the goose binary (e.g., "goose" if in PATH, or absolute path)
    goose_binary_path: String,

    /// Directory containing SQL migration files
    migrations_dir: String,

    /// Database driver name understood by goose (e.g., "postgres")
    driver: String,

    /// Database connection string (DSN) in driver-specific format
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    /// Runner for a PostgreSQL database
    pub fn postgres(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self::new(
            goose_binary_path,
            migrations_dir,
            "postgres".to_string(),
            dsn,
        )
    }

    fn args<'a>(&'a self, command: &'a str) -> Vec<&'a str> {
        vec![
            "-dir",
            &self.migrations_dir,
            &self.driver,
            &self.dsn,
            command,
        ]
    }

    /// Runs all pending migrations
    ///
    /// # Errors
    /// Returns an error if the goose binary cannot be spawned or exits with a
    /// non-zero status (bad DSN, failing migration).
    pub async fn run_migrations(&self) -> Result<()> {
        debug!(migrations_dir = %self.migrations_dir, "running migrations");

        let output = Command::new(&self.goose_binary_path)
            .args(self.args("up"))
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Migration failed.\nstdout: {}\nstderr: {}", stdout, stderr);
        }

        info!(driver = %self.driver, "migrations applied");
        debug!("goose output:\n{}", stdout);
        Ok(())
    }
}
