use chrono::{DateTime, Utc};
use common::domain::{Device, DeviceState};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device as returned by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.device_id,
            name: device.name,
            brand: device.brand,
            state: device.state,
            created_at: device.created_at,
            updated_at: device.updated_at,
            deleted_at: device.deleted_at,
        }
    }
}

/// Body of `POST /devices` and `PUT /devices/{id}`
///
/// `state` stays a string here so an unknown value is reported as a
/// validation error rather than a malformed body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeviceBody {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(length(min = 1))]
    pub brand: String,
    #[garde(custom(is_device_state))]
    pub state: String,
}

fn is_device_state(value: &str, _ctx: &()) -> garde::Result {
    value
        .parse::<DeviceState>()
        .map(|_| ())
        .map_err(|_| garde::Error::new("must be one of: available, in-use, inactive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_response_serializes_nullable_timestamps() {
        let device = Device {
            device_id: Uuid::new_v4(),
            name: "iPhone 15".to_string(),
            brand: "Apple".to_string(),
            state: DeviceState::InUse,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };

        let json = serde_json::to_value(DeviceResponse::from(device.clone())).unwrap();
        assert_eq!(json["id"], device.device_id.to_string());
        assert_eq!(json["state"], "in-use");
        assert!(json["updated_at"].is_null());
        assert!(json["deleted_at"].is_null());
    }

    #[test]
    fn test_device_body_rejects_unknown_state() {
        let body: DeviceBody =
            serde_json::from_str(r#"{"name":"iPhone 15","brand":"Apple","state":"broken"}"#)
                .unwrap();

        let report = body.validate().unwrap_err();
        assert!(report.to_string().contains("state"));
    }
}
