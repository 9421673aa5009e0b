//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a request, converting the garde report to `DomainError::ValidationError`
pub fn validate<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct NewDevice {
        #[garde(length(min = 1))]
        name: String,
        #[garde(length(min = 1))]
        brand: String,
    }

    #[test]
    fn test_validate_success() {
        let request = NewDevice {
            name: "iPhone 15".to_string(),
            brand: "Apple".to_string(),
        };
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn test_validate_names_every_failing_field() {
        let request = NewDevice {
            name: String::new(),
            brand: String::new(),
        };
        match validate(&request) {
            Err(DomainError::ValidationError(msg)) => {
                assert!(msg.contains("name"));
                assert!(msg.contains("brand"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }
}
