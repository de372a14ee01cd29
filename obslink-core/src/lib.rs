// src/lib.rs

pub mod bootstrap;
pub mod error;
pub mod feedback_ids;
pub mod gateway;
pub mod listeners;
pub mod module;
pub mod polls;
pub mod session;
pub mod store;

pub use error::{ErrorClass, ObsLinkError, Result};
pub use gateway::Gateway;
pub use module::ObsLinkModule;
pub use store::{SharedStore, StateStore};
