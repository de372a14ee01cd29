// src/lib.rs

pub mod auth;
pub mod close_code;
pub mod message;
pub mod subscription;

pub use auth::authentication_string;
pub use close_code::CloseCode;
pub use message::{
    ClientMessage, Event, Hello, Identified, Identify, Request, RequestBatch,
    RequestBatchResponse, RequestResponse, RequestStatus, ServerMessage, RPC_VERSION,
};
pub use subscription::EventSubscription;
