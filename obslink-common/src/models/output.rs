// File: src/models/output.rs

/// A video output (virtual cam, projectors, custom outputs), keyed by name —
/// outputs have no uuid on the wire.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub output_name: String,
    pub output_kind: String,
    pub active: bool,
    pub reconnecting: bool,
}

#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub transition_name: String,
    pub transition_kind: String,
    pub fixed: bool,
}
