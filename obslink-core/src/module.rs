//! src/module.rs
//!
//! Host-facing facade. The host runtime drives the lifecycle hooks
//! (`init` / `config_updated` / `destroy`); everything else reads the store
//! handle or sends through the gateway handle. Actions, feedbacks and presets
//! live host-side and consume exactly these two seams.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use obslink_common::models::config::ModuleConfig;
use obslink_common::traits::HostSurface;

use crate::error::{ObsLinkError, Result};
use crate::gateway::Gateway;
use crate::polls::PollLoops;
use crate::session::SessionSupervisor;
use crate::store::{self, SharedStore};

pub struct ObsLinkModule {
    store: SharedStore,
    polls: Arc<PollLoops>,
    host: Arc<dyn HostSurface>,
    session: RwLock<Option<Arc<SessionSupervisor>>>,
}

impl ObsLinkModule {
    pub fn new(host: Arc<dyn HostSurface>) -> Self {
        Self {
            store: store::shared(),
            polls: Arc::new(PollLoops::new()),
            host,
            session: RwLock::new(None),
        }
    }

    /// Brings the connection up. Called by the host once the operator has
    /// filled in a config; replaces any previous session.
    pub async fn init(&self, config: ModuleConfig) {
        info!("[Module] init for {}", config.url());
        self.teardown().await;
        let supervisor = SessionSupervisor::new(
            config,
            self.store.clone(),
            self.host.clone(),
            self.polls.clone(),
        );
        supervisor.start();
        *self.session.write().await = Some(supervisor);
    }

    /// Config edits tear the session down and bring it back up with the new
    /// target; a fatal error state (bad password) is cleared by this path.
    pub async fn config_updated(&self, config: ModuleConfig) {
        info!("[Module] config updated, reconnecting");
        self.init(config).await;
    }

    /// Host is unloading the instance.
    pub async fn destroy(&self) {
        info!("[Module] destroy");
        self.teardown().await;
        let mut s = self.store.write().await;
        s.begin_generation();
        s.reset_scene_source_states();
    }

    async fn teardown(&self) {
        if let Some(supervisor) = self.session.write().await.take() {
            supervisor.stop().await;
        }
    }

    /// Read handle for the consumer layer (choice lists, feedback state).
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Send handle for the consumer layer, present only while a connection
    /// is live.
    pub async fn gateway(&self) -> Result<Arc<Gateway>> {
        match self.session.read().await.as_ref() {
            Some(supervisor) => supervisor.gateway().await.ok_or(ObsLinkError::NotConnected),
            None => Err(ObsLinkError::NotConnected),
        }
    }

    /// Operator-authored raw request. The payload is user-typed JSON; a
    /// parse failure aborts the call here so malformed payloads never reach
    /// the wire.
    pub async fn send_custom_command(&self, request_type: &str, payload: &str) -> Option<Value> {
        let request_data = match parse_user_payload(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("[Module] bad custom command payload: {}", e);
                return None;
            }
        };
        let gateway = self.gateway().await.ok()?;
        gateway.send(request_type, request_data).await
    }

    /// Operator-authored vendor call, wrapped in CallVendorRequest.
    pub async fn send_vendor_request(
        &self,
        vendor_name: &str,
        request_type: &str,
        payload: &str,
    ) -> Option<Value> {
        let request_data = match parse_user_payload(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("[Module] bad vendor request payload: {}", e);
                return None;
            }
        };
        let gateway = self.gateway().await.ok()?;
        gateway
            .send(
                "CallVendorRequest",
                Some(json!({
                    "vendorName": vendor_name,
                    "requestType": request_type,
                    "requestData": request_data.unwrap_or(Value::Null),
                })),
            )
            .await
    }
}

/// Empty input means "no request data"; anything else must be valid JSON.
fn parse_user_payload(payload: &str) -> std::result::Result<Option<Value>, serde_json::Error> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obslink_common::traits::NullHost;

    fn module() -> ObsLinkModule {
        ObsLinkModule::new(Arc::new(NullHost))
    }

    #[test]
    fn empty_payload_means_no_request_data() {
        assert_eq!(parse_user_payload("").unwrap(), None);
        assert_eq!(parse_user_payload("  \n").unwrap(), None);
    }

    #[test]
    fn payload_must_be_valid_json() {
        assert!(parse_user_payload("{not json").is_err());
        assert_eq!(
            parse_user_payload(r#"{"sceneName":"A"}"#).unwrap(),
            Some(json!({"sceneName": "A"}))
        );
    }

    #[tokio::test]
    async fn gateway_absent_before_init() {
        let m = module();
        assert!(matches!(
            m.gateway().await,
            Err(ObsLinkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn custom_command_with_bad_payload_sends_nothing() {
        let m = module();
        assert!(m.send_custom_command("SetSceneName", "{oops").await.is_none());
    }

    #[tokio::test]
    async fn destroy_resets_the_mirror() {
        let m = module();
        {
            let mut s = m.store.write().await;
            s.upsert_source(uuid::Uuid::from_u128(1), "Cam");
        }
        m.destroy().await;
        assert_eq!(m.store.read().await.source_count(), 0);
    }
}
