//! src/listeners.rs
//!
//! One handler per push-event type. Every handler is a narrowly-scoped,
//! idempotent patch: find the entity by uuid, mutate only the fields the
//! event describes, then tell the host which feedback predicates to
//! re-evaluate. Handlers never assume ordering relative to bootstrap or
//! poll writes — all three paths do the same find-by-uuid patch, so
//! last-write-wins regardless of arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use obslink_common::models::scene::SceneRef;
use obslink_common::models::source::{
    is_media_kind, AudioState, FilterRecord, MediaState, MediaStatus, MeterPeak,
};
use obslink_common::models::status::{RecordPhase, StreamPhase};
use obslink_common::traits::HostSurface;
use obslink_protocol::message::Event;

use crate::bootstrap::{self, str_field, uuid_field};
use crate::feedback_ids as fb;
use crate::gateway::Gateway;
use crate::polls::PollLoops;
use crate::store::SharedStore;

pub struct EventListenerBank {
    store: SharedStore,
    host: Arc<dyn HostSurface>,
    gateway: Arc<Gateway>,
    polls: Arc<PollLoops>,
    generation: u64,
}

impl EventListenerBank {
    pub fn new(
        store: SharedStore,
        host: Arc<dyn HostSurface>,
        gateway: Arc<Gateway>,
        polls: Arc<PollLoops>,
        generation: u64,
    ) -> Self {
        Self {
            store,
            host,
            gateway,
            polls,
            generation,
        }
    }

    /// Drains the session's event channel until it closes.
    pub async fn run(self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event.event_type, event.event_data.unwrap_or(Value::Null))
                .await;
        }
        debug!("[Listeners] event channel closed");
    }

    pub async fn dispatch(&self, event_type: &str, d: Value) {
        match event_type {
            // ── scenes ────────────────────────────────────────────────
            "SceneCreated" => {
                if let Some(uuid) = uuid_field(&d, "sceneUuid")
                    && !d["isGroup"].as_bool().unwrap_or(false)
                {
                    let mut s = self.store.write().await;
                    let index = s.scene_count();
                    s.upsert_scene(uuid, &str_field(&d, "sceneName"), index);
                }
            }
            "SceneRemoved" => {
                if let Some(uuid) = uuid_field(&d, "sceneUuid") {
                    self.store.write().await.remove_scene(uuid);
                }
            }
            "SceneNameChanged" => {
                if let Some(uuid) = uuid_field(&d, "sceneUuid") {
                    self.store
                        .write()
                        .await
                        .rename_scene(uuid, &str_field(&d, "sceneName"));
                }
            }
            "SceneListChanged" => {
                if let Some(scenes) = d["scenes"].as_array() {
                    let mut s = self.store.write().await;
                    for scene in scenes {
                        if let Some(uuid) = uuid_field(scene, "sceneUuid") {
                            s.upsert_scene(
                                uuid,
                                &str_field(scene, "sceneName"),
                                scene["sceneIndex"].as_u64().unwrap_or(0) as usize,
                            );
                        }
                    }
                }
            }
            "CurrentProgramSceneChanged" => {
                if let Some(uuid) = uuid_field(&d, "sceneUuid") {
                    self.store.write().await.set_program_scene(SceneRef {
                        uuid,
                        name: str_field(&d, "sceneName"),
                    });
                    self.host
                        .check_feedbacks(&[fb::SCENE_PROGRAM, fb::SCENE_ACTIVE])
                        .await;
                }
            }
            "CurrentPreviewSceneChanged" => {
                if let Some(uuid) = uuid_field(&d, "sceneUuid") {
                    self.store.write().await.hot.preview_scene = Some(SceneRef {
                        uuid,
                        name: str_field(&d, "sceneName"),
                    });
                    self.host
                        .check_feedbacks(&[fb::SCENE_PREVIEW, fb::SCENE_ACTIVE])
                        .await;
                }
            }

            // ── scene items ───────────────────────────────────────────
            "SceneItemCreated" => {
                if let (Some(scene_uuid), Some(source_uuid), Some(item_id)) = (
                    uuid_field(&d, "sceneUuid"),
                    uuid_field(&d, "sourceUuid"),
                    d["sceneItemId"].as_i64(),
                ) {
                    let name = str_field(&d, "sourceName");
                    let mut s = self.store.write().await;
                    s.upsert_source(source_uuid, &name);
                    s.add_scene_item(
                        scene_uuid,
                        obslink_common::models::scene::SceneItem {
                            scene_item_id: item_id,
                            source_uuid,
                            source_name: name,
                            enabled: true,
                            is_group: false,
                        },
                    );
                    drop(s);
                    self.host.check_feedbacks(&[fb::SCENE_ITEM_ACTIVE]).await;
                }
            }
            "SceneItemRemoved" => {
                if let (Some(scene_uuid), Some(item_id)) =
                    (uuid_field(&d, "sceneUuid"), d["sceneItemId"].as_i64())
                {
                    self.store
                        .write()
                        .await
                        .remove_scene_item(scene_uuid, item_id);
                    self.host.check_feedbacks(&[fb::SCENE_ITEM_ACTIVE]).await;
                }
            }
            "SceneItemEnableStateChanged" => {
                if let (Some(scene_uuid), Some(item_id)) =
                    (uuid_field(&d, "sceneUuid"), d["sceneItemId"].as_i64())
                {
                    let enabled = d["sceneItemEnabled"].as_bool().unwrap_or(false);
                    self.store
                        .write()
                        .await
                        .set_scene_item_enabled(scene_uuid, item_id, enabled);
                    self.host.check_feedbacks(&[fb::SCENE_ITEM_ACTIVE]).await;
                }
            }
            "SceneItemListReindexed" => {
                if let (Some(scene_uuid), Some(order)) =
                    (uuid_field(&d, "sceneUuid"), d["sceneItems"].as_array())
                {
                    let index_of: HashMap<i64, usize> = order
                        .iter()
                        .enumerate()
                        .filter_map(|(i, item)| item["sceneItemId"].as_i64().map(|id| (id, i)))
                        .collect();
                    let mut s = self.store.write().await;
                    if let Some(items) = s.scene_items(scene_uuid) {
                        let mut items = items.to_vec();
                        items.sort_by_key(|i| {
                            index_of.get(&i.scene_item_id).copied().unwrap_or(usize::MAX)
                        });
                        s.set_scene_items(scene_uuid, items);
                    }
                }
            }

            // ── inputs ────────────────────────────────────────────────
            "InputCreated" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let kind = d["inputKind"].as_str().map(String::from);
                    let mut s = self.store.write().await;
                    s.upsert_source(uuid, &str_field(&d, "inputName"));
                    s.patch_source(uuid, |rec| rec.input_kind = kind.clone());
                    if let Some(Value::Object(defaults)) = d.get("defaultInputSettings")
                        && let Some(kind) = kind.as_deref()
                    {
                        s.set_input_kind_defaults(kind, defaults.clone());
                    }
                    if let Some(Value::Object(overrides)) = d.get("inputSettings") {
                        let overrides = overrides.clone();
                        s.apply_input_settings(uuid, &overrides);
                    }
                    let arm_media = kind.as_deref().map(is_media_kind).unwrap_or(false);
                    drop(s);
                    if arm_media {
                        self.polls.start_media(
                            self.gateway.clone(),
                            self.store.clone(),
                            self.generation,
                        );
                    }
                }
            }
            "InputRemoved" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    self.store.write().await.remove_source(uuid);
                }
            }
            "InputNameChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    self.store
                        .write()
                        .await
                        .rename_source(uuid, &str_field(&d, "inputName"));
                }
            }
            "InputActiveStateChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let active = d["videoActive"].as_bool().unwrap_or(false);
                    self.store
                        .write()
                        .await
                        .patch_source(uuid, |rec| rec.active = active);
                    self.host.check_feedbacks(&[fb::SOURCE_ACTIVE]).await;
                }
            }
            "InputShowStateChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let showing = d["videoShowing"].as_bool().unwrap_or(false);
                    self.store
                        .write()
                        .await
                        .patch_source(uuid, |rec| rec.video_showing = showing);
                    self.host.check_feedbacks(&[fb::SOURCE_SHOWING]).await;
                }
            }
            "InputMuteStateChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let muted = d["inputMuted"].as_bool().unwrap_or(false);
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.audio.get_or_insert_with(AudioState::default).muted = muted;
                    });
                    self.host.check_feedbacks(&[fb::AUDIO_MUTED]).await;
                }
            }
            "InputVolumeChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let db = d["inputVolumeDb"].as_f64().unwrap_or(0.0);
                    let mul = d["inputVolumeMul"].as_f64().unwrap_or(0.0);
                    self.store.write().await.patch_source(uuid, |rec| {
                        let audio = rec.audio.get_or_insert_with(AudioState::default);
                        audio.volume_db = db;
                        audio.volume_mul = mul;
                    });
                    self.host.check_feedbacks(&[fb::VOLUME]).await;
                }
            }
            "InputAudioBalanceChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let balance = d["inputAudioBalance"].as_f64().unwrap_or(0.5);
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.audio.get_or_insert_with(AudioState::default).balance = balance;
                    });
                }
            }
            "InputAudioSyncOffsetChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let offset = d["inputAudioSyncOffset"].as_i64().unwrap_or(0);
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.audio.get_or_insert_with(AudioState::default).sync_offset_ms = offset;
                    });
                }
            }
            "InputAudioMonitorTypeChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    let monitor = str_field(&d, "monitorType");
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.audio.get_or_insert_with(AudioState::default).monitor_type = monitor;
                    });
                    self.host.check_feedbacks(&[fb::AUDIO_MONITOR_TYPE]).await;
                }
            }
            "InputAudioTracksChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid")
                    && let Some(Value::Object(tracks)) = d.get("inputAudioTracks")
                {
                    let tracks = tracks.clone();
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.audio.get_or_insert_with(AudioState::default).tracks = tracks;
                    });
                }
            }
            "InputSettingsChanged" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid")
                    && let Some(Value::Object(overrides)) = d.get("inputSettings")
                {
                    let overrides = overrides.clone();
                    self.store.write().await.apply_input_settings(uuid, &overrides);
                }
            }
            "InputVolumeMeters" => {
                if let Some(inputs) = d["inputs"].as_array() {
                    let mut s = self.store.write().await;
                    for input in inputs {
                        let Some(uuid) = uuid_field(input, "inputUuid") else {
                            continue;
                        };
                        // levels are [channel][mul, peak, inputPeak]
                        let peak_of = |ch: usize| {
                            input["inputLevelsMul"][ch][1].as_f64().unwrap_or(0.0)
                        };
                        s.set_meter_peak(
                            uuid,
                            MeterPeak {
                                left: peak_of(0),
                                right: peak_of(1),
                            },
                        );
                    }
                    drop(s);
                    self.host.check_feedbacks(&[fb::AUDIO_METER]).await;
                }
            }

            // ── filters (the wire carries source names here, not uuids) ─
            "SourceFilterCreated" => {
                let source = self.resolve_source_name(&d).await;
                if let Some(uuid) = source {
                    let filter = FilterRecord {
                        filter_name: str_field(&d, "filterName"),
                        filter_kind: str_field(&d, "filterKind"),
                        enabled: true,
                        filter_index: d["filterIndex"].as_u64().unwrap_or(0) as u32,
                    };
                    let mut s = self.store.write().await;
                    let mut filters = s.filters(uuid).map(|f| f.to_vec()).unwrap_or_default();
                    filters.push(filter);
                    s.set_filters(uuid, filters);
                }
            }
            "SourceFilterRemoved" => {
                if let Some(uuid) = self.resolve_source_name(&d).await {
                    self.store
                        .write()
                        .await
                        .remove_filter(uuid, &str_field(&d, "filterName"));
                }
            }
            "SourceFilterNameChanged" => {
                if let Some(uuid) = self.resolve_source_name(&d).await {
                    let new_name = str_field(&d, "filterName");
                    self.store.write().await.patch_filter(
                        uuid,
                        &str_field(&d, "oldFilterName"),
                        |f| f.filter_name = new_name,
                    );
                }
            }
            "SourceFilterEnableStateChanged" => {
                if let Some(uuid) = self.resolve_source_name(&d).await {
                    let enabled = d["filterEnabled"].as_bool().unwrap_or(false);
                    self.store.write().await.patch_filter(
                        uuid,
                        &str_field(&d, "filterName"),
                        |f| f.enabled = enabled,
                    );
                    self.host.check_feedbacks(&[fb::FILTER_ENABLED]).await;
                }
            }

            // ── transitions ───────────────────────────────────────────
            "CurrentSceneTransitionChanged" => {
                self.store.write().await.hot.current_transition =
                    d["transitionName"].as_str().map(String::from);
                self.host.check_feedbacks(&[fb::CURRENT_TRANSITION]).await;
            }
            "CurrentSceneTransitionDurationChanged" => {
                self.store.write().await.hot.transition_duration_ms =
                    d["transitionDuration"].as_u64().unwrap_or(0);
            }
            "SceneTransitionStarted" => {
                self.store.write().await.hot.transition_in_progress = true;
                self.host.check_feedbacks(&[fb::TRANSITION_ACTIVE]).await;
            }
            "SceneTransitionEnded" | "SceneTransitionVideoEnded" => {
                self.store.write().await.hot.transition_in_progress = false;
                self.host.check_feedbacks(&[fb::TRANSITION_ACTIVE]).await;
            }

            // ── outputs ───────────────────────────────────────────────
            "StreamStateChanged" => {
                let phase = StreamPhase::from_wire(d["outputState"].as_str().unwrap_or(""));
                self.store.write().await.hot.stream = phase;
                self.host.check_feedbacks(&[fb::STREAMING]).await;
            }
            "RecordStateChanged" => {
                let phase = RecordPhase::from_wire(d["outputState"].as_str().unwrap_or(""));
                self.store.write().await.hot.record = phase;
                self.host.check_feedbacks(&[fb::RECORDING]).await;
            }
            "ReplayBufferStateChanged" => {
                let active = d["outputActive"].as_bool().unwrap_or(false);
                self.store.write().await.hot.replay_buffer_active = active;
                self.host.check_feedbacks(&[fb::REPLAY_BUFFER_ACTIVE]).await;
            }
            "VirtualcamStateChanged" => {
                let active = d["outputActive"].as_bool().unwrap_or(false);
                self.store.write().await.hot.virtual_cam_active = active;
                self.host.check_feedbacks(&[fb::VIRTUAL_CAM_ACTIVE]).await;
            }
            "ReplayBufferSaved" => {
                let mut values = HashMap::new();
                values.insert(
                    "replay_buffer_path".to_string(),
                    str_field(&d, "savedReplayPath"),
                );
                self.host.set_variable_values(values).await;
            }

            // ── config ────────────────────────────────────────────────
            "CurrentSceneCollectionChanging" => {
                info!("[Listeners] scene collection changing, suppressing poll writes");
                self.store.write().await.hot.collection_changing = true;
            }
            "CurrentSceneCollectionChanged" => {
                info!("[Listeners] scene collection changed, rebuilding");
                {
                    let mut s = self.store.write().await;
                    s.hot.collection_changing = false;
                    s.hot.current_scene_collection =
                        d["sceneCollectionName"].as_str().map(String::from);
                    s.reset_scene_source_states();
                }
                bootstrap::refresh_scene_collection(
                    &self.gateway,
                    &self.store,
                    &self.polls,
                    self.generation,
                )
                .await;
                self.host
                    .check_feedbacks(&[fb::SCENE_COLLECTION_ACTIVE])
                    .await;
            }
            "SceneCollectionListChanged" => {
                if let Some(list) = d["sceneCollections"].as_array() {
                    let collections = list
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect();
                    self.store.write().await.set_scene_collections(collections);
                }
            }
            "CurrentProfileChanged" => {
                self.store.write().await.hot.current_profile =
                    d["profileName"].as_str().map(String::from);
                self.host.check_feedbacks(&[fb::PROFILE_ACTIVE]).await;
            }
            "ProfileListChanged" => {
                if let Some(list) = d["profiles"].as_array() {
                    let profiles = list
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect();
                    self.store.write().await.set_profiles(profiles);
                }
            }

            // ── ui ────────────────────────────────────────────────────
            "StudioModeStateChanged" => {
                let enabled = d["studioModeEnabled"].as_bool().unwrap_or(false);
                let mut s = self.store.write().await;
                s.hot.studio_mode = enabled;
                if !enabled {
                    s.hot.preview_scene = None;
                }
                drop(s);
                self.host
                    .check_feedbacks(&[fb::STUDIO_MODE, fb::SCENE_PREVIEW])
                    .await;
            }

            // ── media ─────────────────────────────────────────────────
            "MediaInputPlaybackStarted" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.media.get_or_insert_with(MediaState::default).status =
                            MediaStatus::Playing;
                    });
                    self.polls.start_media(
                        self.gateway.clone(),
                        self.store.clone(),
                        self.generation,
                    );
                    self.host.check_feedbacks(&[fb::MEDIA_PLAYING]).await;
                }
            }
            "MediaInputPlaybackEnded" => {
                if let Some(uuid) = uuid_field(&d, "inputUuid") {
                    self.store.write().await.patch_source(uuid, |rec| {
                        rec.media.get_or_insert_with(MediaState::default).status =
                            MediaStatus::Ended;
                    });
                    self.host.check_feedbacks(&[fb::MEDIA_PLAYING]).await;
                }
            }
            "MediaInputActionTriggered" => {
                // the follow-up state arrives via the media poll; just nudge
                // the predicates
                self.host.check_feedbacks(&[fb::MEDIA_PLAYING]).await;
            }

            // ── vendor passthrough ────────────────────────────────────
            "VendorEvent" => {
                let mut values = HashMap::new();
                values.insert("vendor_name".to_string(), str_field(&d, "vendorName"));
                values.insert("vendor_event_type".to_string(), str_field(&d, "eventType"));
                values.insert(
                    "vendor_event_data".to_string(),
                    d["eventData"].to_string(),
                );
                self.host.set_variable_values(values).await;
                self.host.check_feedbacks(&[fb::VENDOR_EVENT]).await;
            }

            // ExitStarted is handled by the session before events reach us
            "ExitStarted" => {}

            other => debug!("[Listeners] unhandled event {}", other),
        }
    }

    /// Filter events identify their source by name. Names may be stale only
    /// if a rename raced this event, in which case the rename handler has
    /// already updated the cached name we resolve against.
    async fn resolve_source_name(&self, d: &Value) -> Option<uuid::Uuid> {
        let name = d["sourceName"].as_str()?;
        self.store.read().await.source_uuid_by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use std::sync::Mutex;
    use tokio::sync::mpsc as tokio_mpsc;
    use uuid::Uuid;

    /// Records which feedback ids were signaled.
    #[derive(Default)]
    struct RecordingHost {
        checked: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl HostSurface for RecordingHost {
        async fn check_feedbacks(&self, feedback_ids: &[&str]) {
            let mut checked = self.checked.lock().unwrap();
            for id in feedback_ids {
                checked.push(id.to_string());
            }
        }

        async fn set_variable_values(&self, _values: HashMap<String, String>) {}

        async fn update_status(
            &self,
            _status: obslink_common::ConnectionStatus,
            _message: Option<String>,
        ) {
        }
    }

    fn bank(
        store: SharedStore,
        host: Arc<RecordingHost>,
    ) -> EventListenerBank {
        let (tx, _rx) = tokio_mpsc::channel(4);
        let gateway = Gateway::new(tx, store.clone());
        EventListenerBank::new(store, host, gateway, Arc::new(PollLoops::new()), 1)
    }

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn program_scene_change_rotates_and_signals() {
        let store = store::shared();
        {
            let mut s = store.write().await;
            s.upsert_scene(uuid(1), "A", 0);
            s.upsert_scene(uuid(2), "B", 1);
            s.set_program_scene(SceneRef {
                uuid: uuid(1),
                name: "A".into(),
            });
            s.hot.previous_scene = None;
        }
        let host = Arc::new(RecordingHost::default());
        let bank = bank(store.clone(), host.clone());

        bank.dispatch(
            "CurrentProgramSceneChanged",
            serde_json::json!({ "sceneUuid": uuid(2).to_string(), "sceneName": "B" }),
        )
        .await;

        let s = store.read().await;
        assert_eq!(s.hot.program_scene.as_ref().unwrap().uuid, uuid(2));
        assert_eq!(s.hot.program_scene.as_ref().unwrap().name, "B");
        assert_eq!(s.hot.previous_scene.as_ref().unwrap().uuid, uuid(1));
        assert_eq!(s.hot.previous_scene.as_ref().unwrap().name, "A");

        let checked = host.checked.lock().unwrap();
        assert!(checked.contains(&fb::SCENE_PROGRAM.to_string()));
        assert!(checked.contains(&fb::SCENE_ACTIVE.to_string()));
    }

    #[tokio::test]
    async fn rename_event_patches_name_and_keeps_key() {
        let store = store::shared();
        store.write().await.upsert_source(uuid(5), "Old Name");
        let host = Arc::new(RecordingHost::default());
        let bank = bank(store.clone(), host);

        bank.dispatch(
            "InputNameChanged",
            serde_json::json!({ "inputUuid": uuid(5).to_string(), "inputName": "New Name" }),
        )
        .await;

        let s = store.read().await;
        let rec = s.source(uuid(5)).unwrap();
        assert_eq!(rec.source_name, "New Name");
        assert_eq!(rec.valid_name, "New_Name");
    }

    #[tokio::test]
    async fn mute_event_is_idempotent_against_poll_writes() {
        let store = store::shared();
        store.write().await.upsert_source(uuid(3), "Mic");
        store.write().await.patch_source(uuid(3), |rec| {
            rec.audio = Some(AudioState {
                volume_db: -6.0,
                ..Default::default()
            });
        });
        let host = Arc::new(RecordingHost::default());
        let bank = bank(store.clone(), host);

        let event = serde_json::json!({ "inputUuid": uuid(3).to_string(), "inputMuted": true });
        bank.dispatch("InputMuteStateChanged", event.clone()).await;
        bank.dispatch("InputMuteStateChanged", event).await;

        let s = store.read().await;
        let audio = s.source(uuid(3)).unwrap().audio.as_ref().unwrap();
        assert!(audio.muted);
        // the narrowly-scoped patch left the other audio fields alone
        assert_eq!(audio.volume_db, -6.0);
    }

    #[tokio::test]
    async fn collection_changing_sets_guard_flag() {
        let store = store::shared();
        let host = Arc::new(RecordingHost::default());
        let bank = bank(store.clone(), host);

        bank.dispatch("CurrentSceneCollectionChanging", Value::Null)
            .await;
        assert!(store.read().await.hot.collection_changing);
    }

    #[tokio::test]
    async fn events_for_unknown_uuids_are_harmless() {
        let store = store::shared();
        let host = Arc::new(RecordingHost::default());
        let bank = bank(store.clone(), host);

        bank.dispatch(
            "InputMuteStateChanged",
            serde_json::json!({ "inputUuid": uuid(99).to_string(), "inputMuted": true }),
        )
        .await;
        bank.dispatch("SceneRemoved", serde_json::json!({ "sceneUuid": uuid(98).to_string() }))
            .await;
        assert_eq!(store.read().await.source_count(), 0);
    }
}
