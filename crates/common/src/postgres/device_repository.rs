use crate::domain::{
    CreateDeviceRepoInput, Device, DeviceRepository, DeviceState, DomainError, DomainResult,
    FullUpdateDeviceRepoInput, ListDevicesRepoInput, UpdateDeviceStateRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const DEVICE_COLUMNS: &str = "id, name, brand, state, created_at, updated_at, deleted_at";

/// Device row for PostgreSQL storage with timestamp metadata
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        DeviceRow {
            id: row.get(0),
            name: row.get(1),
            brand: row.get(2),
            state: row.get(3),
            created_at: row.get(4),
            updated_at: row.get(5),
            deleted_at: row.get(6),
        }
    }
}

/// Convert database DeviceRow to domain Device
impl TryFrom<DeviceRow> for Device {
    type Error = DomainError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(Device {
            device_id: row.id,
            name: row.name,
            brand: row.brand,
            state: row.state.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn row_to_device(row: &Row) -> DomainResult<Device> {
    DeviceRow::from(row).try_into()
}

/// PostgreSQL implementation of DeviceRepository trait
///
/// Every write is a single conditioned statement, so the lifecycle checks hold
/// even when requests for the same device interleave.
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Reads the live state of a device after a conditioned write matched no row
    async fn live_state(
        &self,
        conn: &deadpool_postgres::Client,
        device_id: Uuid,
    ) -> DomainResult<Option<DeviceState>> {
        let row = conn
            .query_opt(
                "SELECT state FROM devices WHERE id = $1 AND deleted_at IS NULL",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|row| row.get::<_, String>(0).parse())
            .transpose()
    }

    async fn missed_update(
        &self,
        conn: &deadpool_postgres::Client,
        device_id: Uuid,
        expected: DeviceState,
    ) -> DomainError {
        match self.live_state(conn, device_id).await {
            Ok(Some(actual)) => DomainError::DeviceStateConflict {
                device_id,
                expected,
                actual,
            },
            Ok(None) => DomainError::DeviceNotFound(device_id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, input), fields(device_id = %input.device_id, state = %input.state))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO devices (id, name, brand, state, created_at)
                     VALUES ($1, $2, $3, $4, $5)
                     RETURNING {DEVICE_COLUMNS}"
                ),
                &[
                    &input.device_id,
                    &input.name,
                    &input.brand,
                    &input.state.as_str(),
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let device = row_to_device(&row)?;
        info!(device_id = %device.device_id, "Device created in database");
        Ok(device)
    }

    #[instrument(skip(self), fields(device_id = %device_id))]
    async fn get_device_by_id(&self, device_id: Uuid) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {DEVICE_COLUMNS}
                     FROM devices
                     WHERE id = $1 AND deleted_at IS NULL"
                ),
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_device).transpose()
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, expected_state = %input.expected_state))]
    async fn fully_update_device(&self, input: FullUpdateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE devices
                     SET name = $2, brand = $3, state = $4, updated_at = $5
                     WHERE id = $1 AND deleted_at IS NULL AND state = $6
                     RETURNING {DEVICE_COLUMNS}"
                ),
                &[
                    &input.device_id,
                    &input.name,
                    &input.brand,
                    &input.state.as_str(),
                    &now,
                    &input.expected_state.as_str(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let device = row_to_device(&row)?;
                info!(device_id = %device.device_id, "Device fully updated in database");
                Ok(device)
            }
            None => Err(self
                .missed_update(&conn, input.device_id, input.expected_state)
                .await),
        }
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, state = %input.state, expected_state = %input.expected_state))]
    async fn update_device_state(
        &self,
        input: UpdateDeviceStateRepoInput,
    ) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE devices
                     SET state = $2, updated_at = $3
                     WHERE id = $1 AND deleted_at IS NULL AND state = $4
                     RETURNING {DEVICE_COLUMNS}"
                ),
                &[
                    &input.device_id,
                    &input.state.as_str(),
                    &now,
                    &input.expected_state.as_str(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let device = row_to_device(&row)?;
                info!(device_id = %device.device_id, "Device state updated in database");
                Ok(device)
            }
            None => Err(self
                .missed_update(&conn, input.device_id, input.expected_state)
                .await),
        }
    }

    #[instrument(skip(self), fields(device_id = %device_id))]
    async fn delete_device(&self, device_id: Uuid) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let rows_affected = conn
            .execute(
                "UPDATE devices
                 SET deleted_at = $1, updated_at = $1
                 WHERE id = $2 AND deleted_at IS NULL AND state <> $3",
                &[&now, &device_id, &DeviceState::InUse.as_str()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            let live = self.live_state(&conn, device_id).await?;
            return Err(missed_delete(device_id, live));
        }

        info!(device_id = %device_id, "Device soft deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(brand = ?input.brand, state = ?input.state))]
    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Vec<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let brand = input.brand.as_deref();
        let state = input.state.map(|s| s.as_str());

        let rows = conn
            .query(
                &format!(
                    "SELECT {DEVICE_COLUMNS}
                     FROM devices
                     WHERE deleted_at IS NULL
                       AND ($1::text IS NULL OR brand = $1)
                       AND ($2::text IS NULL OR state = $2)
                     ORDER BY name ASC, id ASC"
                ),
                &[&brand, &state],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let devices = rows
            .iter()
            .map(row_to_device)
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(count = devices.len(), "Listed devices from database");
        Ok(devices)
    }
}

/// Classifies a soft delete that matched no row.
///
/// The update only skips live rows that are in use, so a live row seen on the
/// re-read was in use when the delete ran even if it has since been released.
fn missed_delete(device_id: Uuid, live: Option<DeviceState>) -> DomainError {
    match live {
        Some(state) => {
            debug!(device_id = %device_id, state = %state, "Delete skipped a device in use");
            DomainError::DeviceInUse(device_id)
        }
        None => DomainError::DeviceNotFound(device_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missed_delete_on_live_row_is_in_use() {
        let device_id = Uuid::new_v4();

        for state in [DeviceState::InUse, DeviceState::Available, DeviceState::Inactive] {
            let err = missed_delete(device_id, Some(state));
            assert!(
                matches!(err, DomainError::DeviceInUse(id) if id == device_id),
                "state {} gave {:?}",
                state,
                err
            );
        }
    }

    #[test]
    fn test_missed_delete_without_live_row_is_not_found() {
        let device_id = Uuid::new_v4();

        let err = missed_delete(device_id, None);
        assert!(matches!(err, DomainError::DeviceNotFound(id) if id == device_id));
    }
}
