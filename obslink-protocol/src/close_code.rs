//! src/close_code.rs
//!
//! WebSocket close codes the server uses when it tears a session down.
//! Connection supervision keys off `is_fatal`: a fatal close means the
//! operator must fix configuration, so no automatic reconnect is scheduled.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    UnknownReason,
    MessageDecodeError,
    MissingDataField,
    InvalidDataFieldType,
    InvalidDataFieldValue,
    UnknownOpCode,
    NotIdentified,
    AlreadyIdentified,
    AuthenticationFailed,
    UnsupportedRpcVersion,
    SessionInvalidated,
    UnsupportedFeature,
    Other(u16),
}

impl CloseCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            4000 => CloseCode::UnknownReason,
            4002 => CloseCode::MessageDecodeError,
            4003 => CloseCode::MissingDataField,
            4004 => CloseCode::InvalidDataFieldType,
            4005 => CloseCode::InvalidDataFieldValue,
            4006 => CloseCode::UnknownOpCode,
            4007 => CloseCode::NotIdentified,
            4008 => CloseCode::AlreadyIdentified,
            4009 => CloseCode::AuthenticationFailed,
            4010 => CloseCode::UnsupportedRpcVersion,
            4011 => CloseCode::SessionInvalidated,
            4012 => CloseCode::UnsupportedFeature,
            other => CloseCode::Other(other),
        }
    }

    /// Fatal closes require a configuration change; everything else is a
    /// transient condition worth retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CloseCode::AuthenticationFailed | CloseCode::UnsupportedRpcVersion
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_rpc_version_are_fatal() {
        assert!(CloseCode::from_u16(4009).is_fatal());
        assert!(CloseCode::from_u16(4010).is_fatal());
    }

    #[test]
    fn session_invalidated_is_transient() {
        assert!(!CloseCode::from_u16(4011).is_fatal());
        assert!(!CloseCode::from_u16(1006).is_fatal());
    }
}
