use crate::domain::error::{DeviceServiceError, ServiceResult};
use common::domain::{
    decide, CreateDeviceRepoInput, Device, DeviceRepository, DeviceState, DomainError,
    FullUpdateDeviceRepoInput, ListDevicesRepoInput, UpdateDecision, UpdateDeviceStateRepoInput,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const DEVICE_NOT_FOUND: &str = "device not found";
const DEVICE_LOCKED: &str = "device is in use and cannot be updated";
const DEVICE_IN_USE_DELETE: &str = "device is in use and cannot be deleted";
const DEVICE_STATE_CHANGED: &str = "device state changed concurrently";

/// Service request for listing devices, filters combine with AND
#[derive(Debug, Clone, Default, Validate)]
pub struct ListDevicesRequest {
    #[garde(length(min = 1))]
    pub brand: Option<String>,
    #[garde(skip)]
    pub state: Option<DeviceState>,
}

/// Service request for getting a device
#[derive(Debug, Clone)]
pub struct GetDeviceRequest {
    pub device_id: Uuid,
}

/// Service request for registering a device
#[derive(Debug, Clone, Validate)]
pub struct CreateDeviceRequest {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(length(min = 1))]
    pub brand: String,
    #[garde(skip)]
    pub state: DeviceState,
}

/// Service request for updating a device
///
/// Name and brand are ignored when the device is in use.
#[derive(Debug, Clone, Validate)]
pub struct UpdateDeviceRequest {
    #[garde(skip)]
    pub device_id: Uuid,
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(length(min = 1))]
    pub brand: String,
    #[garde(skip)]
    pub state: DeviceState,
}

/// Service request for deleting a device
#[derive(Debug, Clone)]
pub struct DeleteDeviceRequest {
    pub device_id: Uuid,
}

/// Service for device business logic
pub struct DeviceService {
    device_repository: Arc<dyn DeviceRepository>,
}

impl DeviceService {
    pub fn new(device_repository: Arc<dyn DeviceRepository>) -> Self {
        Self { device_repository }
    }

    /// List live devices ordered by name
    #[instrument(skip(self, request), fields(brand = ?request.brand, state = ?request.state))]
    pub async fn list_devices(&self, request: ListDevicesRequest) -> ServiceResult<Vec<Device>> {
        validate_request(&request)?;

        let devices = self
            .device_repository
            .list_devices(ListDevicesRepoInput {
                brand: request.brand,
                state: request.state,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list devices");
                DeviceServiceError::internal("something went wrong while listing devices", e)
            })?;

        debug!(count = devices.len(), "Listed devices");
        Ok(devices)
    }

    /// Get a live device by ID
    #[instrument(skip(self, request), fields(device_id = %request.device_id))]
    pub async fn get_device(&self, request: GetDeviceRequest) -> ServiceResult<Device> {
        match self
            .device_repository
            .get_device_by_id(request.device_id)
            .await
        {
            Ok(Some(device)) => Ok(device),
            Ok(None) => {
                debug!("Device not found");
                Err(DeviceServiceError::not_found(DEVICE_NOT_FOUND))
            }
            Err(e) => {
                error!(error = %e, "Failed to get device");
                Err(DeviceServiceError::internal(
                    "something went wrong while searching device by id",
                    e,
                ))
            }
        }
    }

    /// Register a new device with a generated ID
    #[instrument(skip(self, request), fields(name = %request.name, brand = %request.brand, state = %request.state))]
    pub async fn create_device(&self, request: CreateDeviceRequest) -> ServiceResult<Device> {
        validate_request(&request)?;

        let repo_input = CreateDeviceRepoInput {
            device_id: Uuid::new_v4(),
            name: request.name,
            brand: request.brand,
            state: request.state,
        };

        let device = self
            .device_repository
            .create_device(repo_input)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create device");
                DeviceServiceError::internal("something went wrong while creating device", e)
            })?;

        info!(device_id = %device.device_id, "Device created successfully");
        Ok(device)
    }

    /// Update a device according to its lifecycle state
    ///
    /// Available and inactive devices are fully rewritten. An in-use device
    /// only accepts a change of state, and asking it to stay in use is
    /// rejected without a write. The write is conditioned on the state the
    /// decision was based on, so a concurrent change makes it fail instead of
    /// silently overwriting.
    #[instrument(skip(self, request), fields(device_id = %request.device_id, state = %request.state))]
    pub async fn update_device(&self, request: UpdateDeviceRequest) -> ServiceResult<Device> {
        validate_request(&request)?;

        let current = match self
            .device_repository
            .get_device_by_id(request.device_id)
            .await
        {
            Ok(Some(device)) => device,
            Ok(None) => return Err(DeviceServiceError::not_found(DEVICE_NOT_FOUND)),
            Err(e) => {
                // load failures are reported as not found, the cause is only logged
                warn!(error = %e, "Failed to load device for update");
                return Err(DeviceServiceError::NotFound {
                    message: DEVICE_NOT_FOUND.to_string(),
                    source: Some(e),
                });
            }
        };

        match decide(&current, request.state) {
            UpdateDecision::Rejected(reason) => {
                debug!(?reason, "Update rejected");
                Err(DeviceServiceError::invalid(DEVICE_LOCKED))
            }
            UpdateDecision::StateOnlyUpdate => {
                let device = self
                    .device_repository
                    .update_device_state(UpdateDeviceStateRepoInput {
                        device_id: current.device_id,
                        state: request.state,
                        expected_state: current.state,
                    })
                    .await
                    .map_err(|e| {
                        write_error(e, "something went wrong while updating device state")
                    })?;

                info!(device_id = %device.device_id, "Device state updated");
                Ok(device)
            }
            UpdateDecision::FullUpdate => {
                let device = self
                    .device_repository
                    .fully_update_device(FullUpdateDeviceRepoInput {
                        device_id: current.device_id,
                        name: request.name,
                        brand: request.brand,
                        state: request.state,
                        expected_state: current.state,
                    })
                    .await
                    .map_err(|e| {
                        write_error(e, "something went wrong while fully updating device")
                    })?;

                info!(device_id = %device.device_id, "Device fully updated");
                Ok(device)
            }
        }
    }

    /// Soft delete a device that is not in use
    #[instrument(skip(self, request), fields(device_id = %request.device_id))]
    pub async fn delete_device(&self, request: DeleteDeviceRequest) -> ServiceResult<()> {
        match self
            .device_repository
            .delete_device(request.device_id)
            .await
        {
            Ok(()) => {
                info!("Device soft deleted successfully");
                Ok(())
            }
            Err(DomainError::DeviceNotFound(_)) => {
                Err(DeviceServiceError::not_found(DEVICE_NOT_FOUND))
            }
            Err(DomainError::DeviceInUse(_)) => {
                Err(DeviceServiceError::not_found(DEVICE_IN_USE_DELETE))
            }
            Err(e) => {
                error!(error = %e, "Failed to delete device");
                Err(DeviceServiceError::internal(
                    "something went wrong while deleting device",
                    e,
                ))
            }
        }
    }
}

fn validate_request<T>(request: &T) -> ServiceResult<()>
where
    T: Validate,
    T::Context: Default,
{
    common::garde::validate(request).map_err(|e| match e {
        DomainError::ValidationError(msg) => DeviceServiceError::invalid(msg),
        other => DeviceServiceError::invalid(other.to_string()),
    })
}

fn write_error(e: DomainError, message: &str) -> DeviceServiceError {
    match e {
        DomainError::DeviceStateConflict { .. } => {
            warn!(error = %e, "Conditioned write lost a race");
            DeviceServiceError::invalid(DEVICE_STATE_CHANGED)
        }
        DomainError::DeviceNotFound(_) => DeviceServiceError::NotFound {
            message: DEVICE_NOT_FOUND.to_string(),
            source: Some(e),
        },
        e => {
            error!(error = %e, "{}", message);
            DeviceServiceError::internal(message, e)
        }
    }
}
