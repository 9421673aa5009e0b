use crate::domain::{
    can_delete, CreateDeviceRepoInput, Device, DeviceRepository, DeviceState, DomainError,
    DomainResult, FullUpdateDeviceRepoInput, ListDevicesRepoInput, UpdateDeviceStateRepoInput,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory implementation of DeviceRepository using HashMap
///
/// Applies the same write predicates as the PostgreSQL repository. Each
/// conditioned write checks and mutates under a single write lock.
#[derive(Clone)]
pub struct InMemoryDeviceRepository {
    devices: Arc<RwLock<HashMap<Uuid, Device>>>,
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns a stored row, soft deleted or not
    pub async fn raw_device(&self, device_id: Uuid) -> Option<Device> {
        self.devices.read().await.get(&device_id).cloned()
    }
}

impl Default for InMemoryDeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn live_device_mut(
    devices: &mut HashMap<Uuid, Device>,
    device_id: Uuid,
    expected_state: DeviceState,
) -> DomainResult<&mut Device> {
    let device = devices
        .get_mut(&device_id)
        .filter(|d| d.deleted_at.is_none())
        .ok_or(DomainError::DeviceNotFound(device_id))?;

    if device.state != expected_state {
        return Err(DomainError::DeviceStateConflict {
            device_id,
            expected: expected_state,
            actual: device.state,
        });
    }

    Ok(device)
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let device = Device {
            device_id: input.device_id,
            name: input.name,
            brand: input.brand,
            state: input.state,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };

        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.device_id) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "duplicate device id: {}",
                device.device_id
            )));
        }
        devices.insert(device.device_id, device.clone());
        Ok(device)
    }

    async fn get_device_by_id(&self, device_id: Uuid) -> DomainResult<Option<Device>> {
        let devices = self.devices.read().await;
        Ok(devices
            .get(&device_id)
            .filter(|d| d.deleted_at.is_none())
            .cloned())
    }

    async fn fully_update_device(&self, input: FullUpdateDeviceRepoInput) -> DomainResult<Device> {
        let mut devices = self.devices.write().await;
        let device = live_device_mut(&mut devices, input.device_id, input.expected_state)?;

        device.name = input.name;
        device.brand = input.brand;
        device.state = input.state;
        device.updated_at = Some(Utc::now());
        Ok(device.clone())
    }

    async fn update_device_state(
        &self,
        input: UpdateDeviceStateRepoInput,
    ) -> DomainResult<Device> {
        let mut devices = self.devices.write().await;
        let device = live_device_mut(&mut devices, input.device_id, input.expected_state)?;

        device.state = input.state;
        device.updated_at = Some(Utc::now());
        Ok(device.clone())
    }

    async fn delete_device(&self, device_id: Uuid) -> DomainResult<()> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(&device_id)
            .filter(|d| d.deleted_at.is_none())
            .ok_or(DomainError::DeviceNotFound(device_id))?;

        if !can_delete(device) {
            return Err(DomainError::DeviceInUse(device_id));
        }

        let now = Utc::now();
        device.deleted_at = Some(now);
        device.updated_at = Some(now);
        Ok(())
    }

    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Vec<Device>> {
        let devices = self.devices.read().await;
        let mut listed: Vec<Device> = devices
            .values()
            .filter(|d| d.deleted_at.is_none() && input.matches(d))
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        Ok(listed)
    }
}
