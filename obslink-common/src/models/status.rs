// File: src/models/status.rs

use crate::models::scene::SceneRef;

/// Connection state reported to the host runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// A fatal configuration problem; no automatic retry.
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPhase {
    #[default]
    Stopped,
    Starting,
    Streaming,
    Stopping,
    Reconnecting,
}

impl StreamPhase {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "OBS_WEBSOCKET_OUTPUT_STARTING" => StreamPhase::Starting,
            "OBS_WEBSOCKET_OUTPUT_STARTED" => StreamPhase::Streaming,
            "OBS_WEBSOCKET_OUTPUT_STOPPING" => StreamPhase::Stopping,
            "OBS_WEBSOCKET_OUTPUT_RECONNECTING" => StreamPhase::Reconnecting,
            "OBS_WEBSOCKET_OUTPUT_RECONNECTED" => StreamPhase::Streaming,
            _ => StreamPhase::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, StreamPhase::Streaming | StreamPhase::Reconnecting)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordPhase {
    #[default]
    Stopped,
    Starting,
    Recording,
    Paused,
    Stopping,
}

impl RecordPhase {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "OBS_WEBSOCKET_OUTPUT_STARTING" => RecordPhase::Starting,
            "OBS_WEBSOCKET_OUTPUT_STARTED" => RecordPhase::Recording,
            "OBS_WEBSOCKET_OUTPUT_RESUMED" => RecordPhase::Recording,
            "OBS_WEBSOCKET_OUTPUT_PAUSED" => RecordPhase::Paused,
            "OBS_WEBSOCKET_OUTPUT_STOPPING" => RecordPhase::Stopping,
            _ => RecordPhase::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RecordPhase::Recording | RecordPhase::Paused)
    }
}

/// Version/capability info from the initial handshake fetch.
#[derive(Debug, Clone, Default)]
pub struct VersionInfo {
    pub obs_version: String,
    pub websocket_version: String,
    pub platform: String,
    pub supported_image_formats: Vec<String>,
}

/// Global statistics refreshed by the stats poll loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub available_disk_space: f64,
    pub active_fps: f64,
    pub average_frame_render_time: f64,
    pub render_skipped_frames: u64,
    pub render_total_frames: u64,
    pub output_skipped_frames: u64,
    pub output_total_frames: u64,
}

/// Scalar "hot" state: the fields that change constantly and that most
/// feedback predicates read.
#[derive(Debug, Clone, Default)]
pub struct HotState {
    pub program_scene: Option<SceneRef>,
    pub preview_scene: Option<SceneRef>,
    pub previous_scene: Option<SceneRef>,
    pub studio_mode: bool,
    pub stream: StreamPhase,
    pub record: RecordPhase,
    pub replay_buffer_active: bool,
    pub virtual_cam_active: bool,
    pub current_transition: Option<String>,
    pub transition_duration_ms: u64,
    pub transition_in_progress: bool,
    pub current_profile: Option<String>,
    pub current_scene_collection: Option<String>,
    /// Set between CollectionChanging and CollectionChanged; while true,
    /// poll-driven writes are suppressed.
    pub collection_changing: bool,
    pub stream_congestion: f64,
    pub stream_bytes: u64,
    pub stream_duration_ms: u64,
    pub record_duration_ms: u64,
    pub stats: StatsSnapshot,
}
