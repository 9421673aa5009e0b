mod device_handler;
mod dto;
mod error;
mod logging;
mod server;

pub use device_handler::*;
pub use dto::*;
pub use error::*;
pub use logging::*;
pub use server::*;
