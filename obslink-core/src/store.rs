//! src/store.rs
//!
//! The normalized, in-memory mirror of remote OBS state. Everything is keyed
//! by stable uuid; human-readable names are cached for display and re-derived
//! on rename events. All mutation goes through the patch helpers here — the
//! "find by uuid, patch named fields" discipline is what makes bootstrap,
//! event, and poll writers safe to interleave in any order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use obslink_common::models::choice::{build_choices, ChoiceEntry};
use obslink_common::models::output::{OutputRecord, TransitionRecord};
use obslink_common::models::scene::{SceneItem, SceneRecord, SceneRef};
use obslink_common::models::source::{
    is_media_kind, FilterRecord, MeterPeak, SourceRecord,
};
use obslink_common::models::status::{HotState, VersionInfo};

/// The store is shared across the session reader, pollers, and the module
/// facade; same-struct helpers under one lock keep every write idempotent.
pub type SharedStore = Arc<RwLock<StateStore>>;

pub fn shared() -> SharedStore {
    Arc::new(RwLock::new(StateStore::new()))
}

#[derive(Debug, Default)]
pub struct StateStore {
    /// Bumped once per (re)connection. Writers spawned under an older
    /// generation discard their results instead of racing the rebuild.
    generation: u64,

    sources: HashMap<Uuid, SourceRecord>,
    scenes: HashMap<Uuid, SceneRecord>,
    /// Items per owning scene, in display order.
    scene_items: HashMap<Uuid, Vec<SceneItem>>,
    /// Nested items per group container (a group is also a source).
    groups: HashMap<Uuid, Vec<SceneItem>>,
    /// Filters per owning source.
    filters: HashMap<Uuid, Vec<FilterRecord>>,
    meter_peaks: HashMap<Uuid, MeterPeak>,
    /// Program-designated audio slots ("desktop1", "mic1", ...) → source uuid.
    special_inputs: HashMap<String, Uuid>,

    outputs: HashMap<String, OutputRecord>,
    transitions: HashMap<String, TransitionRecord>,
    profiles: Vec<String>,
    scene_collections: Vec<String>,
    /// Per input kind, the default settings OBS reports for it.
    input_kind_defaults: HashMap<String, Map<String, Value>>,

    pub version: Option<VersionInfo>,
    pub hotkeys: Vec<String>,
    pub monitors: Vec<String>,
    pub video_settings: Map<String, Value>,

    pub hot: HotState,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── generation ────────────────────────────────────────────────────

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Called once per new connection, before bootstrap starts.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Whether a writer spawned under `generation` may still apply results.
    pub fn accepts(&self, generation: u64) -> bool {
        self.generation == generation && !self.hot.collection_changing
    }

    // ── sources ───────────────────────────────────────────────────────

    /// Identity upsert: a uuid already present is left untouched so that
    /// concurrent discovery paths never clobber populated detail fields.
    pub fn upsert_source(&mut self, uuid: Uuid, name: &str) {
        self.sources
            .entry(uuid)
            .or_insert_with(|| SourceRecord::with_name(name));
    }

    pub fn patch_source<F: FnOnce(&mut SourceRecord)>(&mut self, uuid: Uuid, f: F) -> bool {
        match self.sources.get_mut(&uuid) {
            Some(rec) => {
                f(rec);
                true
            }
            None => false,
        }
    }

    pub fn source(&self, uuid: Uuid) -> Option<&SourceRecord> {
        self.sources.get(&uuid)
    }

    pub fn source_uuid_by_name(&self, name: &str) -> Option<Uuid> {
        self.sources
            .iter()
            .find(|(_, rec)| rec.source_name == name)
            .map(|(uuid, _)| *uuid)
    }

    pub fn rename_source(&mut self, uuid: Uuid, new_name: &str) -> bool {
        let found = match self.sources.get_mut(&uuid) {
            Some(rec) => {
                rec.rename(new_name);
                true
            }
            None => false,
        };
        if found {
            // scene items cache the display name too
            for items in self.scene_items.values_mut().chain(self.groups.values_mut()) {
                for item in items.iter_mut().filter(|i| i.source_uuid == uuid) {
                    item.source_name = new_name.to_string();
                }
            }
        }
        found
    }

    pub fn remove_source(&mut self, uuid: Uuid) {
        self.sources.remove(&uuid);
        self.filters.remove(&uuid);
        self.meter_peaks.remove(&uuid);
        self.groups.remove(&uuid);
        for items in self.scene_items.values_mut().chain(self.groups.values_mut()) {
            items.retain(|i| i.source_uuid != uuid);
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Merge kind defaults under the reported settings for one source.
    pub fn apply_input_settings(&mut self, uuid: Uuid, overrides: &Map<String, Value>) -> bool {
        let defaults = self
            .sources
            .get(&uuid)
            .and_then(|rec| rec.input_kind.as_deref())
            .and_then(|kind| self.input_kind_defaults.get(kind))
            .cloned()
            .unwrap_or_default();
        match self.sources.get_mut(&uuid) {
            Some(rec) => {
                let mut merged = defaults;
                for (k, v) in overrides {
                    merged.insert(k.clone(), v.clone());
                }
                rec.settings = merged;
                true
            }
            None => false,
        }
    }

    pub fn set_input_kind_defaults(&mut self, kind: &str, defaults: Map<String, Value>) {
        self.input_kind_defaults.insert(kind.to_string(), defaults);
    }

    /// All sources whose kind has a meaningful playback position.
    pub fn media_sources(&self) -> Vec<Uuid> {
        self.sources
            .iter()
            .filter(|(_, rec)| {
                rec.input_kind.as_deref().map(is_media_kind).unwrap_or(false)
            })
            .map(|(uuid, _)| *uuid)
            .collect()
    }

    pub fn set_meter_peak(&mut self, uuid: Uuid, peak: MeterPeak) {
        self.meter_peaks.insert(uuid, peak);
    }

    pub fn meter_peak(&self, uuid: Uuid) -> Option<MeterPeak> {
        self.meter_peaks.get(&uuid).copied()
    }

    pub fn set_special_input(&mut self, slot: &str, uuid: Uuid) {
        self.special_inputs.insert(slot.to_string(), uuid);
    }

    pub fn special_input(&self, slot: &str) -> Option<Uuid> {
        self.special_inputs.get(slot).copied()
    }

    // ── scenes ────────────────────────────────────────────────────────

    pub fn upsert_scene(&mut self, uuid: Uuid, name: &str, index: usize) {
        match self.scenes.get_mut(&uuid) {
            Some(rec) => rec.scene_index = index,
            None => {
                self.scenes.insert(
                    uuid,
                    SceneRecord {
                        scene_name: name.to_string(),
                        scene_index: index,
                    },
                );
            }
        }
    }

    pub fn scene(&self, uuid: Uuid) -> Option<&SceneRecord> {
        self.scenes.get(&uuid)
    }

    pub fn scene_uuid_by_name(&self, name: &str) -> Option<Uuid> {
        self.scenes
            .iter()
            .find(|(_, rec)| rec.scene_name == name)
            .map(|(uuid, _)| *uuid)
    }

    pub fn rename_scene(&mut self, uuid: Uuid, new_name: &str) -> bool {
        let found = match self.scenes.get_mut(&uuid) {
            Some(rec) => {
                rec.scene_name = new_name.to_string();
                true
            }
            None => false,
        };
        if found {
            // hot refs and scene-as-item placements cache the name
            for slot in [
                &mut self.hot.program_scene,
                &mut self.hot.preview_scene,
                &mut self.hot.previous_scene,
            ] {
                if let Some(r) = slot
                    && r.uuid == uuid
                {
                    r.name = new_name.to_string();
                }
            }
            for items in self.scene_items.values_mut() {
                for item in items.iter_mut().filter(|i| i.source_uuid == uuid) {
                    item.source_name = new_name.to_string();
                }
            }
        }
        found
    }

    pub fn remove_scene(&mut self, uuid: Uuid) {
        self.scenes.remove(&uuid);
        self.scene_items.remove(&uuid);
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// The scene `delta` steps away in the "next/previous" convention the
    /// preview-adjust action uses. OBS reports index 0 as the bottom of its
    /// list, so "previous" is the *higher* index; callers pass `+1` for next
    /// and `-1` for previous and this helper applies the inversion.
    pub fn adjacent_scene(&self, current: Uuid, delta: i64) -> Option<Uuid> {
        let index = self.scenes.get(&current)?.scene_index as i64;
        let target = index - delta;
        self.scenes
            .iter()
            .find(|(_, rec)| rec.scene_index as i64 == target)
            .map(|(uuid, _)| *uuid)
    }

    // ── scene items / groups ──────────────────────────────────────────

    pub fn set_scene_items(&mut self, scene_uuid: Uuid, items: Vec<SceneItem>) {
        self.scene_items.insert(scene_uuid, items);
    }

    pub fn scene_items(&self, scene_uuid: Uuid) -> Option<&[SceneItem]> {
        self.scene_items.get(&scene_uuid).map(|v| v.as_slice())
    }

    pub fn set_group_items(&mut self, group_uuid: Uuid, items: Vec<SceneItem>) {
        self.groups.insert(group_uuid, items);
    }

    pub fn group_items(&self, group_uuid: Uuid) -> Option<&[SceneItem]> {
        self.groups.get(&group_uuid).map(|v| v.as_slice())
    }

    pub fn add_scene_item(&mut self, scene_uuid: Uuid, item: SceneItem) {
        let items = self.scene_items.entry(scene_uuid).or_default();
        if !items.iter().any(|i| i.scene_item_id == item.scene_item_id) {
            items.push(item);
        }
    }

    pub fn remove_scene_item(&mut self, scene_uuid: Uuid, scene_item_id: i64) {
        if let Some(items) = self.scene_items.get_mut(&scene_uuid) {
            items.retain(|i| i.scene_item_id != scene_item_id);
        }
    }

    /// The enabled flag lives on the (scene, item) pair: the same source may
    /// be enabled in one scene and disabled in another.
    pub fn set_scene_item_enabled(
        &mut self,
        scene_uuid: Uuid,
        scene_item_id: i64,
        enabled: bool,
    ) -> bool {
        let lists = [
            self.scene_items.get_mut(&scene_uuid),
            self.groups.get_mut(&scene_uuid),
        ];
        for items in lists.into_iter().flatten() {
            if let Some(item) = items.iter_mut().find(|i| i.scene_item_id == scene_item_id) {
                item.enabled = enabled;
                return true;
            }
        }
        false
    }

    // ── filters ───────────────────────────────────────────────────────

    pub fn set_filters(&mut self, source_uuid: Uuid, filters: Vec<FilterRecord>) {
        self.filters.insert(source_uuid, filters);
    }

    pub fn filters(&self, source_uuid: Uuid) -> Option<&[FilterRecord]> {
        self.filters.get(&source_uuid).map(|v| v.as_slice())
    }

    pub fn patch_filter<F: FnOnce(&mut FilterRecord)>(
        &mut self,
        source_uuid: Uuid,
        filter_name: &str,
        f: F,
    ) -> bool {
        if let Some(filters) = self.filters.get_mut(&source_uuid)
            && let Some(rec) = filters.iter_mut().find(|r| r.filter_name == filter_name)
        {
            f(rec);
            return true;
        }
        false
    }

    pub fn remove_filter(&mut self, source_uuid: Uuid, filter_name: &str) {
        if let Some(filters) = self.filters.get_mut(&source_uuid) {
            filters.retain(|r| r.filter_name != filter_name);
        }
    }

    // ── outputs / transitions / profiles / collections ────────────────

    pub fn upsert_output(&mut self, output: OutputRecord) {
        self.outputs.insert(output.output_name.clone(), output);
    }

    pub fn set_output_active(&mut self, name: &str, active: bool) -> bool {
        match self.outputs.get_mut(name) {
            Some(rec) => {
                rec.active = active;
                true
            }
            None => false,
        }
    }

    pub fn output(&self, name: &str) -> Option<&OutputRecord> {
        self.outputs.get(name)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    pub fn set_transitions(&mut self, transitions: Vec<TransitionRecord>) {
        self.transitions = transitions
            .into_iter()
            .map(|t| (t.transition_name.clone(), t))
            .collect();
    }

    pub fn transition(&self, name: &str) -> Option<&TransitionRecord> {
        self.transitions.get(name)
    }

    pub fn set_profiles(&mut self, profiles: Vec<String>) {
        self.profiles = profiles;
    }

    pub fn set_scene_collections(&mut self, collections: Vec<String>) {
        self.scene_collections = collections;
    }

    // ── hot state ─────────────────────────────────────────────────────

    /// Program-scene change rotates the previous-scene slot first.
    pub fn set_program_scene(&mut self, scene: SceneRef) {
        self.hot.previous_scene = self.hot.program_scene.take();
        self.hot.program_scene = Some(scene);
    }

    // ── scene-collection lifecycle ────────────────────────────────────

    /// Clears every scene-collection-scoped map. Run before any full rebuild
    /// so no stale entry survives a collection swap.
    pub fn reset_scene_source_states(&mut self) {
        self.scenes.clear();
        self.sources.clear();
        self.scene_items.clear();
        self.groups.clear();
        self.filters.clear();
        self.meter_peaks.clear();
        self.special_inputs.clear();
    }

    // ── derived choice lists ──────────────────────────────────────────

    pub fn scene_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .scenes
            .iter()
            .map(|(uuid, rec)| ChoiceEntry::new(uuid.to_string(), rec.scene_name.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn scene_choices_with_current(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .scenes
            .iter()
            .map(|(uuid, rec)| ChoiceEntry::new(uuid.to_string(), rec.scene_name.clone()))
            .collect();
        build_choices(entries, &[ChoiceEntry::new("current", "<Current scene>")])
    }

    pub fn source_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .sources
            .iter()
            .map(|(uuid, rec)| ChoiceEntry::new(uuid.to_string(), rec.source_name.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn audio_source_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .sources
            .iter()
            .filter(|(_, rec)| rec.audio.is_some())
            .map(|(uuid, rec)| ChoiceEntry::new(uuid.to_string(), rec.source_name.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn media_source_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .media_sources()
            .into_iter()
            .filter_map(|uuid| {
                self.sources
                    .get(&uuid)
                    .map(|rec| ChoiceEntry::new(uuid.to_string(), rec.source_name.clone()))
            })
            .collect();
        build_choices(entries, &[])
    }

    pub fn transition_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .transitions
            .keys()
            .map(|name| ChoiceEntry::new(name.clone(), name.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn profile_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .profiles
            .iter()
            .map(|p| ChoiceEntry::new(p.clone(), p.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn scene_collection_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .scene_collections
            .iter()
            .map(|c| ChoiceEntry::new(c.clone(), c.clone()))
            .collect();
        build_choices(entries, &[])
    }

    pub fn output_choices(&self) -> Vec<ChoiceEntry> {
        let entries = self
            .outputs
            .keys()
            .map(|name| ChoiceEntry::new(name.clone(), name.clone()))
            .collect();
        build_choices(entries, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn upsert_source_is_identity_preserving() {
        let mut store = StateStore::new();
        let id = uuid(1);
        store.upsert_source(id, "Cam");
        store.patch_source(id, |rec| {
            rec.input_kind = Some("v4l2_input".into());
            rec.active = true;
        });

        // a second discovery path must not clobber populated fields
        store.upsert_source(id, "Cam");
        let rec = store.source(id).unwrap();
        assert_eq!(rec.input_kind.as_deref(), Some("v4l2_input"));
        assert!(rec.active);
    }

    #[test]
    fn rename_source_patches_cached_item_names_in_place() {
        let mut store = StateStore::new();
        let scene = uuid(1);
        let src = uuid(2);
        store.upsert_source(src, "Old");
        store.set_scene_items(
            scene,
            vec![SceneItem {
                scene_item_id: 7,
                source_uuid: src,
                source_name: "Old".into(),
                enabled: true,
                is_group: false,
            }],
        );

        assert!(store.rename_source(src, "New"));
        assert_eq!(store.source(src).unwrap().source_name, "New");
        assert_eq!(store.scene_items(scene).unwrap()[0].source_name, "New");
        // key unchanged: lookups made before the rename stay valid
        assert_eq!(store.source_uuid_by_name("New"), Some(src));
    }

    #[test]
    fn enabled_flag_is_per_scene() {
        let mut store = StateStore::new();
        let (scene_a, scene_b, src) = (uuid(1), uuid(2), uuid(3));
        let item = |id: i64| SceneItem {
            scene_item_id: id,
            source_uuid: src,
            source_name: "Cam".into(),
            enabled: true,
            is_group: false,
        };
        store.set_scene_items(scene_a, vec![item(1)]);
        store.set_scene_items(scene_b, vec![item(4)]);

        assert!(store.set_scene_item_enabled(scene_a, 1, false));
        assert!(!store.scene_items(scene_a).unwrap()[0].enabled);
        assert!(store.scene_items(scene_b).unwrap()[0].enabled);
    }

    #[test]
    fn reset_clears_collection_scoped_maps_only() {
        let mut store = StateStore::new();
        store.upsert_scene(uuid(1), "A", 0);
        store.upsert_source(uuid(2), "Cam");
        store.set_scene_items(uuid(1), vec![]);
        store.set_filters(uuid(2), vec![]);
        store.upsert_output(OutputRecord {
            output_name: "virtualcam".into(),
            output_kind: "virtualcam_output".into(),
            active: false,
            reconnecting: false,
        });
        store.set_profiles(vec!["main".into()]);

        store.reset_scene_source_states();

        assert_eq!(store.scene_count(), 0);
        assert_eq!(store.source_count(), 0);
        assert!(store.scene_items(uuid(1)).is_none());
        assert!(store.filters(uuid(2)).is_none());
        // not collection-scoped: outputs and profiles survive
        assert!(store.output("virtualcam").is_some());
        assert_eq!(store.profile_choices().len(), 1);
    }

    #[test]
    fn program_scene_change_rotates_previous() {
        let mut store = StateStore::new();
        store.set_program_scene(SceneRef {
            uuid: uuid(1),
            name: "A".into(),
        });
        store.set_program_scene(SceneRef {
            uuid: uuid(2),
            name: "B".into(),
        });
        assert_eq!(store.hot.program_scene.as_ref().unwrap().name, "B");
        assert_eq!(store.hot.previous_scene.as_ref().unwrap().name, "A");
    }

    #[test]
    fn adjacent_scene_uses_inverted_index_order() {
        let mut store = StateStore::new();
        store.upsert_scene(uuid(1), "Bottom", 0);
        store.upsert_scene(uuid(2), "Middle", 1);
        store.upsert_scene(uuid(3), "Top", 2);

        // "previous" is the higher index, "next" the lower one
        assert_eq!(store.adjacent_scene(uuid(2), -1), Some(uuid(3)));
        assert_eq!(store.adjacent_scene(uuid(2), 1), Some(uuid(1)));
        assert_eq!(store.adjacent_scene(uuid(3), -1), None);
    }

    #[test]
    fn choice_lists_are_sorted_and_deduped() {
        let mut store = StateStore::new();
        store.upsert_scene(uuid(1), "zulu", 0);
        store.upsert_scene(uuid(2), "Alpha", 1);
        let choices = store.scene_choices_with_current();
        assert_eq!(choices[0].id, "current");
        assert_eq!(choices[1].label, "Alpha");
        assert_eq!(choices[2].label, "zulu");
    }

    #[test]
    fn generation_gates_stale_writers() {
        let mut store = StateStore::new();
        let g1 = store.begin_generation();
        assert!(store.accepts(g1));
        let g2 = store.begin_generation();
        assert!(!store.accepts(g1));
        assert!(store.accepts(g2));
        store.hot.collection_changing = true;
        assert!(!store.accepts(g2));
    }

    #[test]
    fn settings_merge_defaults_under_overrides() {
        let mut store = StateStore::new();
        let id = uuid(1);
        let mut defaults = Map::new();
        defaults.insert("local_file".into(), Value::String(String::new()));
        defaults.insert("looping".into(), Value::Bool(false));
        store.set_input_kind_defaults("ffmpeg_source", defaults);

        store.upsert_source(id, "Clip");
        store.patch_source(id, |rec| rec.input_kind = Some("ffmpeg_source".into()));

        let mut overrides = Map::new();
        overrides.insert("local_file".into(), Value::String("/a.mp4".into()));
        assert!(store.apply_input_settings(id, &overrides));

        let settings = &store.source(id).unwrap().settings;
        assert_eq!(settings["local_file"], "/a.mp4");
        assert_eq!(settings["looping"], false);
    }
}
