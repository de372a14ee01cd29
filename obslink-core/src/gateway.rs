//! src/gateway.rs
//!
//! The sole outbound-request path. Callers get `Option<Value>` back: `None`
//! means "this call did not happen" — rejected, timed out, or never sent —
//! and the store must be assumed unchanged. The gateway never mutates the
//! store itself; it only reads it for the legacy name→uuid rewrite.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use obslink_protocol::message::{
    ClientMessage, Request, RequestBatch, RequestBatchResponse, RequestResponse,
    EXECUTION_SERIAL_REALTIME,
};

use crate::store::SharedStore;

/// Hardening beyond the observed behavior: a hung remote call resolves to
/// `None` after this long instead of blocking its caller forever.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Rejection comments that are expected in normal operation (asking an
/// audio-less input for audio state) and excluded from the aggregated
/// failure log.
const BENIGN_COMMENTS: [&str; 2] = [
    "The specified input does not support audio",
    "The specified source does not support audio",
];

/// Legacy name-keyed field and the uuid field that supersedes it.
const COMPAT_FIELDS: [(&str, &str, CompatKind); 3] = [
    ("sceneName", "sceneUuid", CompatKind::Scene),
    ("inputName", "inputUuid", CompatKind::Source),
    ("sourceName", "sourceUuid", CompatKind::Source),
];

#[derive(Clone, Copy)]
enum CompatKind {
    Scene,
    Source,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub request_type: String,
    pub request_id: String,
    pub request_data: Option<Value>,
}

impl BatchItem {
    pub fn new(request_type: &str, request_id: &str, request_data: Option<Value>) -> Self {
        Self {
            request_type: request_type.to_string(),
            request_id: request_id.to_string(),
            request_data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub request_id: String,
    pub success: bool,
    pub comment: Option<String>,
    pub response_data: Option<Value>,
}

pub struct Gateway {
    outbound: mpsc::Sender<String>,
    pending: DashMap<String, oneshot::Sender<RequestResponse>>,
    pending_batches: DashMap<String, oneshot::Sender<RequestBatchResponse>>,
    store: SharedStore,
}

impl Gateway {
    pub fn new(outbound: mpsc::Sender<String>, store: SharedStore) -> Arc<Self> {
        Arc::new(Self {
            outbound,
            pending: DashMap::new(),
            pending_batches: DashMap::new(),
            store,
        })
    }

    /// Send one request. A missing response (rejection, timeout, dead
    /// socket) is logged here and surfaced as `None`.
    pub async fn send(&self, request_type: &str, request_data: Option<Value>) -> Option<Value> {
        let request_data = match request_data {
            Some(d) => Some(self.rewrite_compat(d).await),
            None => None,
        };

        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let frame = match ClientMessage::Request(Request {
            request_type: request_type.to_string(),
            request_id: request_id.clone(),
            request_data,
        })
        .to_frame()
        {
            Ok(f) => f,
            Err(e) => {
                self.pending.remove(&request_id);
                warn!("[Gateway] failed to serialize {}: {}", request_type, e);
                return None;
            }
        };

        if self.outbound.send(frame).await.is_err() {
            self.pending.remove(&request_id);
            debug!("[Gateway] {} not sent: connection is down", request_type);
            return None;
        }

        match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(resp)) => {
                if resp.request_status.result {
                    Some(resp.response_data.unwrap_or(Value::Object(Map::new())))
                } else {
                    debug!(
                        "[Gateway] {} rejected (code {}): {}",
                        request_type,
                        resp.request_status.code,
                        resp.request_status.comment.as_deref().unwrap_or("")
                    );
                    None
                }
            }
            Ok(Err(_)) => {
                debug!("[Gateway] {} dropped: session ended", request_type);
                None
            }
            Err(_) => {
                self.pending.remove(&request_id);
                warn!("[Gateway] {} timed out after {:?}", request_type, REQUEST_TIMEOUT);
                None
            }
        }
    }

    /// Send a non-transactional batch: one round trip, one independent
    /// outcome per item, always exactly `items.len()` results back.
    pub async fn send_batch(&self, items: Vec<BatchItem>) -> Vec<BatchResult> {
        if items.is_empty() {
            return Vec::new();
        }

        let batch_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_batches.insert(batch_id.clone(), tx);

        let requests = items
            .iter()
            .map(|item| Request {
                request_type: item.request_type.clone(),
                request_id: item.request_id.clone(),
                request_data: item.request_data.clone(),
            })
            .collect();

        let frame = match ClientMessage::RequestBatch(RequestBatch {
            request_id: batch_id.clone(),
            halt_on_failure: false,
            execution_type: EXECUTION_SERIAL_REALTIME,
            requests,
        })
        .to_frame()
        {
            Ok(f) => f,
            Err(e) => {
                self.pending_batches.remove(&batch_id);
                warn!("[Gateway] failed to serialize batch: {}", e);
                return Self::all_failed(&items, "batch not serialized");
            }
        };

        if self.outbound.send(frame).await.is_err() {
            self.pending_batches.remove(&batch_id);
            debug!("[Gateway] batch of {} not sent: connection is down", items.len());
            return Self::all_failed(&items, "connection is down");
        }

        let response = match timeout(BATCH_TIMEOUT, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                debug!("[Gateway] batch dropped: session ended");
                return Self::all_failed(&items, "session ended");
            }
            Err(_) => {
                self.pending_batches.remove(&batch_id);
                warn!("[Gateway] batch of {} timed out", items.len());
                return Self::all_failed(&items, "timed out");
            }
        };

        let mut results = Vec::with_capacity(items.len());
        let mut failures: Vec<String> = Vec::new();
        for item in &items {
            match response
                .results
                .iter()
                .find(|r| r.request_id == item.request_id)
            {
                Some(r) => {
                    if !r.request_status.result {
                        let comment = r.request_status.comment.clone().unwrap_or_default();
                        if !BENIGN_COMMENTS.iter().any(|b| comment.contains(b)) {
                            failures.push(format!("{} ({}): {}", item.request_type, item.request_id, comment));
                        }
                    }
                    results.push(BatchResult {
                        request_id: item.request_id.clone(),
                        success: r.request_status.result,
                        comment: r.request_status.comment.clone(),
                        response_data: r.response_data.clone(),
                    });
                }
                None => results.push(BatchResult {
                    request_id: item.request_id.clone(),
                    success: false,
                    comment: Some("no result returned".into()),
                    response_data: None,
                }),
            }
        }

        if !failures.is_empty() {
            warn!("[Gateway] batch had {} failure(s): {}", failures.len(), failures.join("; "));
        }
        results
    }

    fn all_failed(items: &[BatchItem], comment: &str) -> Vec<BatchResult> {
        items
            .iter()
            .map(|item| BatchResult {
                request_id: item.request_id.clone(),
                success: false,
                comment: Some(comment.to_string()),
                response_data: None,
            })
            .collect()
    }

    /// Backward-compatible field rewrite: a legacy name field without its
    /// uuid counterpart gets the uuid resolved from the store added in.
    /// Unresolvable names pass through unchanged — the remote side still
    /// accepts names.
    async fn rewrite_compat(&self, mut data: Value) -> Value {
        let Some(obj) = data.as_object_mut() else {
            return data;
        };
        let lookups: Vec<(usize, String)> = COMPAT_FIELDS
            .iter()
            .enumerate()
            .filter_map(|(i, (name_field, uuid_field, _))| {
                if obj.contains_key(*uuid_field) {
                    return None;
                }
                obj.get(*name_field)
                    .and_then(|v| v.as_str())
                    .map(|name| (i, name.to_string()))
            })
            .collect();
        if lookups.is_empty() {
            return data;
        }

        let store = self.store.read().await;
        for (i, name) in lookups {
            let (_, uuid_field, kind) = COMPAT_FIELDS[i];
            let resolved = match kind {
                CompatKind::Scene => store.scene_uuid_by_name(&name),
                CompatKind::Source => store.source_uuid_by_name(&name),
            };
            if let Some(uuid) = resolved {
                obj.insert(uuid_field.to_string(), Value::String(uuid.to_string()));
            }
        }
        data
    }

    // ── completion side, driven by the session read loop ──────────────

    pub fn complete(&self, resp: RequestResponse) {
        match self.pending.remove(&resp.request_id) {
            Some((_, tx)) => {
                let _ = tx.send(resp);
            }
            None => debug!("[Gateway] response for unknown request {}", resp.request_id),
        }
    }

    pub fn complete_batch(&self, resp: RequestBatchResponse) {
        match self.pending_batches.remove(&resp.request_id) {
            Some((_, tx)) => {
                let _ = tx.send(resp);
            }
            None => debug!("[Gateway] response for unknown batch {}", resp.request_id),
        }
    }

    /// Drop every in-flight call; their awaiters resolve to `None`.
    pub fn abort_pending(&self) {
        self.pending.clear();
        self.pending_batches.clear();
    }
}
