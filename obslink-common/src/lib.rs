// src/lib.rs

pub mod models;
pub mod traits;

pub use models::config::ModuleConfig;
pub use models::status::ConnectionStatus;
pub use traits::{HostSurface, NullHost};
