// File: src/models/source.rs

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// One mirrored source/input, keyed in the store by its stable uuid.
///
/// Fields arrive piecemeal: discovery (a scene-item list or the special-input
/// fetch) creates the record with identity only, and later bootstrap batches,
/// events, and polls fill the rest in.
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    pub source_name: String,
    /// `source_name` sanitized into a variable-identifier-safe form.
    pub valid_name: String,
    /// Absent for bare scene references that are not real inputs.
    pub input_kind: Option<String>,
    pub is_group: bool,
    /// Contributing video to the live (program) output somewhere.
    pub active: bool,
    /// Rendering in the currently visible preview output.
    pub video_showing: bool,
    /// Present only for audio-capable inputs.
    pub audio: Option<AudioState>,
    /// Input-kind defaults merged under the last-known overrides.
    pub settings: Map<String, serde_json::Value>,
    /// Present only for playable media kinds.
    pub media: Option<MediaState>,
    /// Set when this source lives inside a group container.
    pub group_name: Option<String>,
}

impl SourceRecord {
    pub fn with_name(name: &str) -> Self {
        Self {
            source_name: name.to_string(),
            valid_name: valid_name(name),
            ..Default::default()
        }
    }

    pub fn rename(&mut self, name: &str) {
        self.source_name = name.to_string();
        self.valid_name = valid_name(name);
    }
}

/// Source names are free text; variable ids are not. Anything outside
/// `[A-Za-z0-9_-]` becomes an underscore.
pub fn valid_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct AudioState {
    pub muted: bool,
    pub volume_db: f64,
    pub volume_mul: f64,
    pub balance: f64,
    pub sync_offset_ms: i64,
    pub monitor_type: String,
    pub tracks: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaState {
    pub status: MediaStatus,
    pub cursor_ms: i64,
    pub duration_ms: i64,
}

impl MediaState {
    pub fn elapsed_text(&self) -> String {
        format_ms(self.cursor_ms)
    }

    pub fn remaining_text(&self) -> String {
        format_ms((self.duration_ms - self.cursor_ms).max(0))
    }
}

fn format_ms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaStatus {
    #[default]
    None,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
    Unknown(String),
}

impl MediaStatus {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "OBS_MEDIA_STATE_NONE" => MediaStatus::None,
            "OBS_MEDIA_STATE_OPENING" => MediaStatus::Opening,
            "OBS_MEDIA_STATE_BUFFERING" => MediaStatus::Buffering,
            "OBS_MEDIA_STATE_PLAYING" => MediaStatus::Playing,
            "OBS_MEDIA_STATE_PAUSED" => MediaStatus::Paused,
            "OBS_MEDIA_STATE_STOPPED" => MediaStatus::Stopped,
            "OBS_MEDIA_STATE_ENDED" => MediaStatus::Ended,
            "OBS_MEDIA_STATE_ERROR" => MediaStatus::Error,
            other => MediaStatus::Unknown(other.to_string()),
        }
    }
}

/// Input kinds whose playback position is meaningful, i.e. the ones the
/// media poll loop queries.
pub fn is_media_kind(kind: &str) -> bool {
    matches!(kind, "ffmpeg_source" | "vlc_source")
}

/// A volume-meter peak sample for one audio-capable input.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeterPeak {
    pub left: f64,
    pub right: f64,
}

/// A filter attached to a source, keyed in the store by the owning source's
/// uuid.
#[derive(Debug, Clone)]
pub struct FilterRecord {
    pub filter_name: String,
    pub filter_kind: String,
    pub enabled: bool,
    pub filter_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name_replaces_forbidden_chars() {
        assert_eq!(valid_name("My Cam (HD) #2"), "My_Cam__HD___2");
        assert_eq!(valid_name("plain_name-1"), "plain_name-1");
    }

    #[test]
    fn media_time_text() {
        let m = MediaState {
            status: MediaStatus::Playing,
            cursor_ms: 75_000,
            duration_ms: 3_700_000,
        };
        assert_eq!(m.elapsed_text(), "01:15");
        assert_eq!(m.remaining_text(), "1:00:25");
    }

    #[test]
    fn media_status_wire_mapping() {
        assert_eq!(
            MediaStatus::from_wire("OBS_MEDIA_STATE_PLAYING"),
            MediaStatus::Playing
        );
        assert_eq!(
            MediaStatus::from_wire("SOMETHING_NEW"),
            MediaStatus::Unknown("SOMETHING_NEW".into())
        );
    }
}
