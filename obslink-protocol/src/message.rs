//! src/message.rs
//!
//! obs-websocket v5 opcode envelopes. Every frame on the socket is
//! `{ "op": <number>, "d": <payload> }`; the payload shape depends on the op.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// The single RPC version this client speaks.
pub const RPC_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// First frame the server sends after the socket opens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    /// Present only when the server requires password authentication.
    #[serde(default)]
    pub authentication: Option<HelloAuth>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloAuth {
    pub challenge: String,
    pub salt: String,
}

/// Our answer to `Hello`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

/// Server acknowledgement that the session is live.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: u32,
    #[serde(default)]
    pub event_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

/// Batch execution modes. We only ever send `SERIAL_REALTIME`, but the
/// others exist on the wire.
pub const EXECUTION_NONE: i8 = -1;
pub const EXECUTION_SERIAL_REALTIME: i8 = 0;
pub const EXECUTION_SERIAL_FRAME: i8 = 1;
pub const EXECUTION_PARALLEL: i8 = 2;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatch {
    pub request_id: String,
    pub halt_on_failure: bool,
    pub execution_type: i8,
    pub requests: Vec<Request>,
}

/// The results list is parallel to the batch's request list: exactly one
/// entry per submitted request, in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatchResponse {
    pub request_id: String,
    pub results: Vec<RequestResponse>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    op: u8,
    d: Value,
}

/// Frames the server can send us.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Hello(Hello),
    Identified(Identified),
    Event(Event),
    RequestResponse(RequestResponse),
    RequestBatchResponse(RequestBatchResponse),
    /// An opcode we don't handle (e.g. future protocol additions). Logged
    /// and dropped by the caller, never an error.
    Unknown { op: u8, data: Value },
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        let msg = match raw.op {
            0 => ServerMessage::Hello(serde_json::from_value(raw.d)?),
            2 => ServerMessage::Identified(serde_json::from_value(raw.d)?),
            5 => ServerMessage::Event(serde_json::from_value(raw.d)?),
            7 => ServerMessage::RequestResponse(serde_json::from_value(raw.d)?),
            9 => ServerMessage::RequestBatchResponse(serde_json::from_value(raw.d)?),
            op => ServerMessage::Unknown { op, data: raw.d },
        };
        Ok(msg)
    }
}

/// Frames we can send to the server.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Identify(Identify),
    Reidentify { event_subscriptions: u32 },
    Request(Request),
    RequestBatch(RequestBatch),
}

impl ClientMessage {
    pub fn op(&self) -> u8 {
        match self {
            ClientMessage::Identify(_) => 1,
            ClientMessage::Reidentify { .. } => 3,
            ClientMessage::Request(_) => 6,
            ClientMessage::RequestBatch(_) => 8,
        }
    }

    /// Serialize into the `{op, d}` envelope ready for a TEXT frame.
    pub fn to_frame(&self) -> Result<String, MessageError> {
        let d = match self {
            ClientMessage::Identify(p) => serde_json::to_value(p)?,
            ClientMessage::Reidentify { event_subscriptions } => {
                json!({ "eventSubscriptions": event_subscriptions })
            }
            ClientMessage::Request(p) => serde_json::to_value(p)?,
            ClientMessage::RequestBatch(p) => serde_json::to_value(p)?,
        };
        Ok(serde_json::to_string(&json!({ "op": self.op(), "d": d }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_with_auth() {
        let txt = r#"{
            "op": 0,
            "d": {
                "obsWebSocketVersion": "5.3.4",
                "rpcVersion": 1,
                "authentication": { "challenge": "ch", "salt": "sa" }
            }
        }"#;
        match ServerMessage::parse(txt).unwrap() {
            ServerMessage::Hello(h) => {
                assert_eq!(h.rpc_version, 1);
                let auth = h.authentication.unwrap();
                assert_eq!(auth.challenge, "ch");
                assert_eq!(auth.salt, "sa");
            }
            other => panic!("expected Hello, got {:?}", other),
        }
    }

    #[test]
    fn parses_hello_without_auth() {
        let txt = r#"{"op":0,"d":{"obsWebSocketVersion":"5.3.4","rpcVersion":1}}"#;
        match ServerMessage::parse(txt).unwrap() {
            ServerMessage::Hello(h) => assert!(h.authentication.is_none()),
            other => panic!("expected Hello, got {:?}", other),
        }
    }

    #[test]
    fn parses_request_response() {
        let txt = r#"{
            "op": 7,
            "d": {
                "requestType": "GetVersion",
                "requestId": "abc",
                "requestStatus": { "result": false, "code": 604, "comment": "nope" },
                "responseData": null
            }
        }"#;
        match ServerMessage::parse(txt).unwrap() {
            ServerMessage::RequestResponse(r) => {
                assert_eq!(r.request_id, "abc");
                assert!(!r.request_status.result);
                assert_eq!(r.request_status.comment.as_deref(), Some("nope"));
            }
            other => panic!("expected RequestResponse, got {:?}", other),
        }
    }

    #[test]
    fn unknown_op_is_not_an_error() {
        let txt = r#"{"op":42,"d":{"whatever":true}}"#;
        match ServerMessage::parse(txt).unwrap() {
            ServerMessage::Unknown { op, .. } => assert_eq!(op, 42),
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn identify_frame_shape() {
        let msg = ClientMessage::Identify(Identify {
            rpc_version: RPC_VERSION,
            authentication: None,
            event_subscriptions: 2047,
        });
        let frame = msg.to_frame().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["op"], 1);
        assert_eq!(v["d"]["rpcVersion"], 1);
        assert_eq!(v["d"]["eventSubscriptions"], 2047);
        // absent auth must be omitted, not null
        assert!(v["d"].get("authentication").is_none());
    }

    #[test]
    fn batch_frame_carries_all_items() {
        let msg = ClientMessage::RequestBatch(RequestBatch {
            request_id: "batch-1".into(),
            halt_on_failure: false,
            execution_type: EXECUTION_SERIAL_REALTIME,
            requests: vec![
                Request {
                    request_type: "GetSceneItemList".into(),
                    request_id: "r1".into(),
                    request_data: Some(json!({ "sceneUuid": "u1" })),
                },
                Request {
                    request_type: "GetSceneItemList".into(),
                    request_id: "r2".into(),
                    request_data: Some(json!({ "sceneUuid": "u2" })),
                },
            ],
        });
        let v: Value = serde_json::from_str(&msg.to_frame().unwrap()).unwrap();
        assert_eq!(v["op"], 8);
        assert_eq!(v["d"]["requests"].as_array().unwrap().len(), 2);
        assert_eq!(v["d"]["haltOnFailure"], false);
    }
}
