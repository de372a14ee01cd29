// File: src/traits.rs
//
// The boundary between the sync engine and the host runtime's UI surface.
// The consumer layer (actions/feedbacks/presets/variables) lives on the other
// side of this trait: it reads the store, calls the gateway, and gets told
// here when something it rendered may have changed.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::status::ConnectionStatus;

#[async_trait]
pub trait HostSurface: Send + Sync {
    /// Ask the host to re-evaluate the named feedback predicates.
    async fn check_feedbacks(&self, feedback_ids: &[&str]);

    /// Push updated variable values to the host for interpolation.
    async fn set_variable_values(&self, values: HashMap<String, String>);

    /// Report connection status changes (shown on the host's config surface).
    async fn update_status(&self, status: ConnectionStatus, message: Option<String>);
}

/// Host that ignores everything; used in tests and while no host is attached.
#[derive(Debug, Default)]
pub struct NullHost;

#[async_trait]
impl HostSurface for NullHost {
    async fn check_feedbacks(&self, _feedback_ids: &[&str]) {}

    async fn set_variable_values(&self, _values: HashMap<String, String>) {}

    async fn update_status(&self, _status: ConnectionStatus, _message: Option<String>) {}
}
