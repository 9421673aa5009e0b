use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a device
///
/// The canonical string form is shared by storage and the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "in-use")]
    InUse,
    #[serde(rename = "inactive")]
    Inactive,
}

impl DeviceState {
    pub const ALL: [DeviceState; 3] = [
        DeviceState::Available,
        DeviceState::InUse,
        DeviceState::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Available => "available",
            DeviceState::InUse => "in-use",
            DeviceState::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(DeviceState::Available),
            "in-use" => Ok(DeviceState::InUse),
            "inactive" => Ok(DeviceState::Inactive),
            other => Err(DomainError::InvalidDeviceState(format!(
                "'{}', must be one of: available, in-use, inactive",
                other
            ))),
        }
    }
}

/// Device entity as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub created_at: DateTime<Utc>,
    /// Absent until the first mutation
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Repository input for creating a device (id generated by the service)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceRepoInput {
    pub device_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
}

/// Repository input for rewriting name, brand and state.
///
/// The write only applies while the persisted state still equals
/// `expected_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullUpdateDeviceRepoInput {
    pub device_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub expected_state: DeviceState,
}

/// Repository input for rewriting only the state column.
///
/// The write only applies while the persisted state still equals
/// `expected_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceStateRepoInput {
    pub device_id: Uuid,
    pub state: DeviceState,
    pub expected_state: DeviceState,
}

/// Repository input for listing devices, filters combine with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDevicesRepoInput {
    pub brand: Option<String>,
    pub state: Option<DeviceState>,
}

impl ListDevicesRepoInput {
    pub fn matches(&self, device: &Device) -> bool {
        self.brand.as_ref().is_none_or(|brand| *brand == device.brand)
            && self.state.is_none_or(|state| state == device.state)
    }
}

/// Repository trait for device persistence operations
///
/// Every read excludes soft deleted rows and every write is conditioned on the
/// row not being soft deleted.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a new device, returning the stored record
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device>;

    /// Get a live device by ID
    async fn get_device_by_id(&self, device_id: Uuid) -> DomainResult<Option<Device>>;

    /// Rewrite name, brand and state, recomputing updated_at
    ///
    /// Fails with `DeviceStateConflict` when the persisted state differs from
    /// `expected_state`, and with `DeviceNotFound` when no live row exists.
    async fn fully_update_device(&self, input: FullUpdateDeviceRepoInput) -> DomainResult<Device>;

    /// Rewrite only the state, recomputing updated_at
    async fn update_device_state(&self, input: UpdateDeviceStateRepoInput)
        -> DomainResult<Device>;

    /// Soft delete a device that is not in use
    ///
    /// Zero affected rows is reported as `DeviceInUse` when the live row is in
    /// use and `DeviceNotFound` otherwise.
    async fn delete_device(&self, device_id: Uuid) -> DomainResult<()>;

    /// List live devices ordered by name ascending
    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Vec<Device>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(brand: &str, state: DeviceState) -> Device {
        Device {
            device_id: Uuid::new_v4(),
            name: "iPhone 15".to_string(),
            brand: brand.to_string(),
            state,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in DeviceState::ALL {
            assert_eq!(state.as_str().parse::<DeviceState>().unwrap(), state);
        }
        assert_eq!(DeviceState::InUse.to_string(), "in-use");
    }

    #[test]
    fn test_state_rejects_unknown_value() {
        let result = "in_use".parse::<DeviceState>();
        assert!(matches!(result, Err(DomainError::InvalidDeviceState(_))));

        let result = "Available".parse::<DeviceState>();
        assert!(result.is_err());
    }

    #[test]
    fn test_state_serde_uses_canonical_strings() {
        let json = serde_json::to_string(&DeviceState::InUse).unwrap();
        assert_eq!(json, "\"in-use\"");

        let state: DeviceState = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(state, DeviceState::Inactive);
    }

    #[test]
    fn test_list_filter_matches() {
        let apple = device("Apple", DeviceState::Available);
        let samsung = device("Samsung", DeviceState::InUse);

        let no_filter = ListDevicesRepoInput::default();
        assert!(no_filter.matches(&apple));
        assert!(no_filter.matches(&samsung));

        let by_brand = ListDevicesRepoInput {
            brand: Some("Apple".to_string()),
            state: None,
        };
        assert!(by_brand.matches(&apple));
        assert!(!by_brand.matches(&samsung));

        let by_brand_and_state = ListDevicesRepoInput {
            brand: Some("Apple".to_string()),
            state: Some(DeviceState::InUse),
        };
        assert!(!by_brand_and_state.matches(&apple));
        assert!(!by_brand_and_state.matches(&samsung));
    }

    #[test]
    fn test_brand_filter_is_exact() {
        let apple = device("Apple", DeviceState::Available);
        let filter = ListDevicesRepoInput {
            brand: Some("apple".to_string()),
            state: None,
        };
        assert!(!filter.matches(&apple));
    }
}
