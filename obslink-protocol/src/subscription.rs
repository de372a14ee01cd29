//! src/subscription.rs
//!
//! Event-subscription bitmask sent in `Identify`. The low bits are the
//! normal event categories; the high bits are high-volume streams that the
//! server only delivers when explicitly requested.

/// Bit values for the `eventSubscriptions` field.
pub struct EventSubscription;

impl EventSubscription {
    pub const GENERAL: u32 = 1 << 0;
    pub const CONFIG: u32 = 1 << 1;
    pub const SCENES: u32 = 1 << 2;
    pub const INPUTS: u32 = 1 << 3;
    pub const TRANSITIONS: u32 = 1 << 4;
    pub const FILTERS: u32 = 1 << 5;
    pub const OUTPUTS: u32 = 1 << 6;
    pub const SCENE_ITEMS: u32 = 1 << 7;
    pub const MEDIA_INPUTS: u32 = 1 << 8;
    pub const VENDORS: u32 = 1 << 9;
    pub const UI: u32 = 1 << 10;

    /// All low-volume categories.
    pub const ALL: u32 = Self::GENERAL
        | Self::CONFIG
        | Self::SCENES
        | Self::INPUTS
        | Self::TRANSITIONS
        | Self::FILTERS
        | Self::OUTPUTS
        | Self::SCENE_ITEMS
        | Self::MEDIA_INPUTS
        | Self::VENDORS
        | Self::UI;

    pub const INPUT_VOLUME_METERS: u32 = 1 << 16;
    pub const INPUT_ACTIVE_STATE_CHANGED: u32 = 1 << 17;
    pub const INPUT_SHOW_STATE_CHANGED: u32 = 1 << 18;
    pub const SCENE_ITEM_TRANSFORM_CHANGED: u32 = 1 << 19;

    /// The mask this module identifies with: everything, plus the
    /// high-volume streams the feedback layer needs.
    pub fn module_mask() -> u32 {
        Self::ALL
            | Self::INPUT_VOLUME_METERS
            | Self::INPUT_ACTIVE_STATE_CHANGED
            | Self::INPUT_SHOW_STATE_CHANGED
            | Self::SCENE_ITEM_TRANSFORM_CHANGED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_low_bits_only() {
        assert_eq!(EventSubscription::ALL, 0x7FF);
    }

    #[test]
    fn module_mask_includes_high_volume_streams() {
        let mask = EventSubscription::module_mask();
        assert_ne!(mask & EventSubscription::INPUT_VOLUME_METERS, 0);
        assert_ne!(mask & EventSubscription::INPUT_ACTIVE_STATE_CHANGED, 0);
        assert_ne!(mask & EventSubscription::INPUT_SHOW_STATE_CHANGED, 0);
        assert_ne!(mask & EventSubscription::SCENE_ITEM_TRANSFORM_CHANGED, 0);
        assert_eq!(mask & EventSubscription::ALL, EventSubscription::ALL);
    }
}
