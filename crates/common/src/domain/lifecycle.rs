//! Device lifecycle rules.
//!
//! A device in the `in-use` state is locked: its name and brand cannot change
//! and it cannot be deleted. Its state stays writable so it can be released.

use crate::domain::{Device, DeviceState};

/// Kind of write an update request is allowed to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Name, brand and state may all be rewritten
    FullUpdate,
    /// Only the state may be rewritten, requested name/brand are ignored
    StateOnlyUpdate,
    /// No write may happen
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The device is in use and the request does not change its state
    Locked,
}

/// Decide how an update to `current` requesting `requested_state` is applied.
pub fn decide(current: &Device, requested_state: DeviceState) -> UpdateDecision {
    if current.state != DeviceState::InUse {
        return UpdateDecision::FullUpdate;
    }

    if requested_state == current.state {
        UpdateDecision::Rejected(RejectionReason::Locked)
    } else {
        UpdateDecision::StateOnlyUpdate
    }
}

/// Whether `current` may be soft deleted.
pub fn can_delete(current: &Device) -> bool {
    current.state != DeviceState::InUse
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn device_in(state: DeviceState) -> Device {
        Device {
            device_id: Uuid::new_v4(),
            name: "Galaxy S23 FE".to_string(),
            brand: "Samsung".to_string(),
            state,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_unlocked_device_allows_full_update_to_any_state() {
        for current in [DeviceState::Available, DeviceState::Inactive] {
            for requested in DeviceState::ALL {
                assert_eq!(
                    decide(&device_in(current), requested),
                    UpdateDecision::FullUpdate,
                    "{current} -> {requested}"
                );
            }
        }
    }

    #[test]
    fn test_in_use_device_allows_state_only_update() {
        let current = device_in(DeviceState::InUse);
        assert_eq!(
            decide(&current, DeviceState::Available),
            UpdateDecision::StateOnlyUpdate
        );
        assert_eq!(
            decide(&current, DeviceState::Inactive),
            UpdateDecision::StateOnlyUpdate
        );
    }

    #[test]
    fn test_in_use_device_rejects_same_state() {
        let current = device_in(DeviceState::InUse);
        assert_eq!(
            decide(&current, DeviceState::InUse),
            UpdateDecision::Rejected(RejectionReason::Locked)
        );
    }

    #[test]
    fn test_can_delete() {
        assert!(can_delete(&device_in(DeviceState::Available)));
        assert!(can_delete(&device_in(DeviceState::Inactive)));
        assert!(!can_delete(&device_in(DeviceState::InUse)));
    }
}
