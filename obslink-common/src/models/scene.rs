// File: src/models/scene.rs

use uuid::Uuid;

/// One mirrored scene, keyed in the store by its stable uuid.
///
/// `scene_index` is the position OBS reports: index 0 is the *bottom* of the
/// scene list in the OBS UI, so a "previous" scene has a *higher* index.
#[derive(Debug, Clone)]
pub struct SceneRecord {
    pub scene_name: String,
    pub scene_index: usize,
}

/// The placement of a source inside one specific scene. `scene_item_id` is
/// identity within that scene only; the same source placed in two scenes has
/// two distinct item ids, each with its own enabled flag.
#[derive(Debug, Clone)]
pub struct SceneItem {
    pub scene_item_id: i64,
    pub source_uuid: Uuid,
    pub source_name: String,
    pub enabled: bool,
    pub is_group: bool,
}

/// Lightweight (uuid, name) pair for the hot program/preview/previous slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRef {
    pub uuid: Uuid,
    pub name: String,
}
