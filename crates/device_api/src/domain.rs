mod device_service;
mod error;

pub use device_service::*;
pub use error::*;
