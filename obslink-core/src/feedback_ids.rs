// src/feedback_ids.rs
//
// Feedback predicate ids the host knows us by. Listener handlers pass these
// to `HostSurface::check_feedbacks` so the host re-evaluates only what the
// event could have changed.

pub const SCENE_PROGRAM: &str = "scene_program";
pub const SCENE_PREVIEW: &str = "scene_preview";
/// Program-or-preview; re-checked whenever either slot moves.
pub const SCENE_ACTIVE: &str = "scene_active";
pub const SCENE_ITEM_ACTIVE: &str = "scene_item_active";
pub const STREAMING: &str = "streaming";
pub const RECORDING: &str = "recording";
pub const REPLAY_BUFFER_ACTIVE: &str = "replay_buffer_active";
pub const VIRTUAL_CAM_ACTIVE: &str = "virtual_cam_active";
pub const OUTPUT_ACTIVE: &str = "output_active";
pub const AUDIO_MUTED: &str = "audio_muted";
pub const VOLUME: &str = "volume";
pub const AUDIO_MONITOR_TYPE: &str = "audio_monitor_type";
pub const AUDIO_METER: &str = "audio_meter";
pub const MEDIA_PLAYING: &str = "media_playing";
pub const SOURCE_ACTIVE: &str = "source_active";
pub const SOURCE_SHOWING: &str = "source_showing";
pub const FILTER_ENABLED: &str = "filter_enabled";
pub const TRANSITION_ACTIVE: &str = "transition_active";
pub const CURRENT_TRANSITION: &str = "current_transition";
pub const STUDIO_MODE: &str = "studio_mode";
pub const PROFILE_ACTIVE: &str = "profile_active";
pub const SCENE_COLLECTION_ACTIVE: &str = "scene_collection_active";
pub const VENDOR_EVENT: &str = "vendor_event";
