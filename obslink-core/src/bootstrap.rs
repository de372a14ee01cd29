//! src/bootstrap.rs
//!
//! The ordered bulk-fetch sequence run once per successful connection.
//! Stage order matters: scene-item lists reference sources by uuid, so item
//! lists are fetched (and identities upserted) before the one wide batch
//! that hydrates source detail. Only stage 1 failure aborts the sequence;
//! everything else degrades to "that field stays unset".

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use obslink_common::models::output::{OutputRecord, TransitionRecord};
use obslink_common::models::scene::{SceneItem, SceneRef};
use obslink_common::models::source::{
    is_media_kind, AudioState, FilterRecord, MediaState, MediaStatus,
};
use obslink_common::models::status::{RecordPhase, StreamPhase, VersionInfo};

use crate::error::{ObsLinkError, Result};
use crate::gateway::{BatchItem, Gateway};
use crate::polls::PollLoops;
use crate::store::SharedStore;

/// The special-input slot names OBS designates for program audio.
const SPECIAL_SLOTS: [&str; 6] = ["desktop1", "desktop2", "mic1", "mic2", "mic3", "mic4"];

/// Runs the full sequence. `generation` is the connection generation all
/// writes are gated on.
pub async fn run(
    gateway: &Arc<Gateway>,
    store: &SharedStore,
    polls: &PollLoops,
    generation: u64,
) -> Result<()> {
    // stage 1: version/capability info; failure here is a connection failure
    fetch_version(gateway, store, generation).await?;

    // stage 2: general parameters
    fetch_general(gateway, store, generation).await;

    // stage 3: one stats fetch, then the poll owns it
    gateway.send("GetStats", None).await;
    polls.start_stats(gateway.clone(), store.clone(), generation);
    fetch_output_phases(gateway, store, generation).await;

    // stage 4: profiles and scene collections (independent)
    fetch_profiles(gateway, store, generation).await;
    fetch_scene_collections(gateway, store, generation).await;

    // stages 5 + 6: the scene-collection-scoped graph
    refresh_scene_collection(gateway, store, polls, generation).await;

    info!("[Bootstrap] complete (generation {})", generation);
    Ok(())
}

async fn fetch_version(gateway: &Gateway, store: &SharedStore, generation: u64) -> Result<()> {
    let data = gateway
        .send("GetVersion", None)
        .await
        .ok_or_else(|| ObsLinkError::Handshake("GetVersion returned nothing".into()))?;
    let info = VersionInfo {
        obs_version: str_field(&data, "obsVersion"),
        websocket_version: str_field(&data, "obsWebSocketVersion"),
        platform: str_field(&data, "platformDescription"),
        supported_image_formats: data["supportedImageFormats"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    };
    let studio_mode = gateway
        .send("GetStudioModeEnabled", None)
        .await
        .and_then(|d| d["studioModeEnabled"].as_bool())
        .unwrap_or(false);

    let mut s = store.write().await;
    if s.accepts(generation) {
        s.version = Some(info);
        s.hot.studio_mode = studio_mode;
    }
    Ok(())
}

async fn fetch_general(gateway: &Gateway, store: &SharedStore, generation: u64) {
    if let Some(data) = gateway.send("GetHotkeyList", None).await {
        let hotkeys = data["hotkeys"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.hotkeys = hotkeys;
        }
    } else {
        debug!("[Bootstrap] no hotkey list");
    }

    if let Some(data) = gateway.send("GetOutputList", None).await {
        let mut s = store.write().await;
        if s.accepts(generation)
            && let Some(outputs) = data["outputs"].as_array()
        {
            for o in outputs {
                s.upsert_output(OutputRecord {
                    output_name: str_field(o, "outputName"),
                    output_kind: str_field(o, "outputKind"),
                    active: o["outputActive"].as_bool().unwrap_or(false),
                    reconnecting: false,
                });
            }
        }
    } else {
        debug!("[Bootstrap] no output list");
    }

    if let Some(data) = gateway.send("GetMonitorList", None).await {
        let monitors = data["monitors"]
            .as_array()
            .map(|a| {
                a.iter()
                    .map(|m| str_field(m, "monitorName"))
                    .collect()
            })
            .unwrap_or_default();
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.monitors = monitors;
        }
    }

    if let Some(data) = gateway.send("GetVideoSettings", None).await {
        let mut s = store.write().await;
        if s.accepts(generation)
            && let Value::Object(map) = data
        {
            s.video_settings = map;
        }
    }

    if let Some(data) = gateway.send("GetReplayBufferStatus", None).await {
        let active = data["outputActive"].as_bool().unwrap_or(false);
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.hot.replay_buffer_active = active;
        }
    } else {
        // replay buffer is not configured on every install
        debug!("[Bootstrap] no replay buffer status");
    }

    // per-kind default settings, used later to backfill settings fields the
    // remote does not echo back
    if let Some(data) = gateway.send("GetInputKindList", None).await {
        let kinds: Vec<String> = data["inputKinds"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let items = kinds
            .iter()
            .map(|kind| {
                BatchItem::new(
                    "GetInputDefaultSettings",
                    kind,
                    Some(json!({ "inputKind": kind })),
                )
            })
            .collect();
        let results = gateway.send_batch(items).await;
        let mut s = store.write().await;
        if s.accepts(generation) {
            for r in results.into_iter().filter(|r| r.success) {
                if let Some(Value::Object(defaults)) =
                    r.response_data.map(|d| d["defaultInputSettings"].clone())
                {
                    s.set_input_kind_defaults(&r.request_id, defaults);
                }
            }
        }
    }
}

async fn fetch_output_phases(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let stream = gateway.send("GetStreamStatus", None).await;
    let record = gateway.send("GetRecordStatus", None).await;
    let mut s = store.write().await;
    if !s.accepts(generation) {
        return;
    }
    if let Some(data) = stream {
        s.hot.stream = if data["outputActive"].as_bool().unwrap_or(false) {
            StreamPhase::Streaming
        } else {
            StreamPhase::Stopped
        };
        s.hot.stream_bytes = data["outputBytes"].as_u64().unwrap_or(0);
        s.hot.stream_duration_ms = data["outputDuration"].as_u64().unwrap_or(0);
    }
    if let Some(data) = record {
        s.hot.record = if data["outputPaused"].as_bool().unwrap_or(false) {
            RecordPhase::Paused
        } else if data["outputActive"].as_bool().unwrap_or(false) {
            RecordPhase::Recording
        } else {
            RecordPhase::Stopped
        };
        s.hot.record_duration_ms = data["outputDuration"].as_u64().unwrap_or(0);
    }
}

async fn fetch_profiles(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let Some(data) = gateway.send("GetProfileList", None).await else {
        debug!("[Bootstrap] no profile list");
        return;
    };
    let profiles = data["profiles"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let current = data["currentProfileName"].as_str().map(String::from);
    let mut s = store.write().await;
    if s.accepts(generation) {
        s.set_profiles(profiles);
        s.hot.current_profile = current;
    }
}

async fn fetch_scene_collections(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let Some(data) = gateway.send("GetSceneCollectionList", None).await else {
        debug!("[Bootstrap] no scene collection list");
        return;
    };
    let collections = data["sceneCollections"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let current = data["currentSceneCollectionName"].as_str().map(String::from);
    let mut s = store.write().await;
    if s.accepts(generation) {
        s.set_scene_collections(collections);
        s.hot.current_scene_collection = current;
    }
}

/// Stages 5–6: everything scoped to the active scene collection. Also
/// re-run (after a store reset) when the collection changes mid-session.
pub async fn refresh_scene_collection(
    gateway: &Arc<Gateway>,
    store: &SharedStore,
    polls: &PollLoops,
    generation: u64,
) {
    fetch_transitions(gateway, store, generation).await;
    let special_names = fetch_special_inputs(gateway).await;
    fetch_input_identities(gateway, store, generation, &special_names).await;
    fetch_scenes(gateway, store, generation).await;
    hydrate_scene_graph(gateway, store, generation).await;

    let has_media = !store.read().await.media_sources().is_empty();
    if has_media {
        polls.start_media(gateway.clone(), store.clone(), generation);
    }
}

async fn fetch_transitions(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let list = gateway.send("GetSceneTransitionList", None).await;
    let current = gateway.send("GetCurrentSceneTransition", None).await;
    let mut s = store.write().await;
    if !s.accepts(generation) {
        return;
    }
    if let Some(data) = list
        && let Some(transitions) = data["transitions"].as_array()
    {
        s.set_transitions(
            transitions
                .iter()
                .map(|t| TransitionRecord {
                    transition_name: str_field(t, "transitionName"),
                    transition_kind: str_field(t, "transitionKind"),
                    fixed: t["transitionFixed"].as_bool().unwrap_or(false),
                })
                .collect(),
        );
    }
    if let Some(data) = current {
        s.hot.current_transition = data["transitionName"].as_str().map(String::from);
        s.hot.transition_duration_ms = data["transitionDuration"].as_u64().unwrap_or(0);
    }
}

/// GetSpecialInputs reports names only; uuids are resolved against the
/// input list fetched right after.
async fn fetch_special_inputs(gateway: &Gateway) -> Vec<(String, String)> {
    let Some(data) = gateway.send("GetSpecialInputs", None).await else {
        debug!("[Bootstrap] no special inputs");
        return Vec::new();
    };
    SPECIAL_SLOTS
        .iter()
        .filter_map(|slot| {
            data[*slot]
                .as_str()
                .filter(|n| !n.is_empty())
                .map(|n| (slot.to_string(), n.to_string()))
        })
        .collect()
}

/// Input identities (uuid, name, kind) for every input, scene-placed or not.
/// This is the second discovery path besides scene-item lists; both go
/// through the identity-preserving upsert, so arrival order is immaterial.
async fn fetch_input_identities(
    gateway: &Gateway,
    store: &SharedStore,
    generation: u64,
    special_names: &[(String, String)],
) {
    let Some(data) = gateway.send("GetInputList", None).await else {
        debug!("[Bootstrap] no input list");
        return;
    };
    let mut s = store.write().await;
    if !s.accepts(generation) {
        return;
    }
    if let Some(inputs) = data["inputs"].as_array() {
        for input in inputs {
            let Some(uuid) = uuid_field(input, "inputUuid") else {
                continue;
            };
            let name = str_field(input, "inputName");
            s.upsert_source(uuid, &name);
            let kind = input["inputKind"].as_str().map(String::from);
            s.patch_source(uuid, |rec| {
                if rec.input_kind.is_none() {
                    rec.input_kind = kind;
                }
            });
            if let Some((slot, _)) = special_names.iter().find(|(_, n)| *n == name) {
                s.set_special_input(slot, uuid);
            }
        }
    }
}

async fn fetch_scenes(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let Some(data) = gateway.send("GetSceneList", None).await else {
        debug!("[Bootstrap] no scene list");
        return;
    };
    let mut s = store.write().await;
    if !s.accepts(generation) {
        return;
    }
    if let Some(scenes) = data["scenes"].as_array() {
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
    if let Some(uuid) = uuid_field(&data, "currentProgramSceneUuid") {
        s.set_program_scene(SceneRef {
            uuid,
            name: str_field(&data, "currentProgramSceneName"),
        });
        // bootstrap is not a scene change; there is no previous scene yet
        s.hot.previous_scene = None;
    }
    if let Some(uuid) = uuid_field(&data, "currentPreviewSceneUuid") {
        s.hot.preview_scene = Some(SceneRef {
            uuid,
            name: str_field(&data, "currentPreviewSceneName"),
        });
    }
}

/// Stage 6: item lists for every scene, nested item lists for every group,
/// then one wide detail batch over the union of discovered sources.
async fn hydrate_scene_graph(gateway: &Gateway, store: &SharedStore, generation: u64) {
    let scene_uuids: Vec<Uuid> = {
        let s = store.read().await;
        if !s.accepts(generation) {
            return;
        }
        s.scene_choices()
            .iter()
            .filter_map(|c| Uuid::parse_str(&c.id).ok())
            .collect()
    };

    let mut discovered: HashSet<Uuid> = store
        .read()
        .await
        .source_choices()
        .iter()
        .filter_map(|c| Uuid::parse_str(&c.id).ok())
        .collect();
    let mut group_uuids: HashSet<Uuid> = HashSet::new();

    // 6a: every scene's item list in one batch
    let items = scene_uuids
        .iter()
        .map(|uuid| {
            BatchItem::new(
                "GetSceneItemList",
                &uuid.to_string(),
                Some(json!({ "sceneUuid": uuid.to_string() })),
            )
        })
        .collect();
    let results = gateway.send_batch(items).await;
    {
        let mut s = store.write().await;
        if !s.accepts(generation) {
            return;
        }
        for r in results {
            let Ok(scene_uuid) = Uuid::parse_str(&r.request_id) else {
                continue;
            };
            if !r.success {
                debug!("[Bootstrap] no item list for scene {}", scene_uuid);
                continue;
            }
            let Some(data) = r.response_data else { continue };
            let parsed = parse_scene_items(&data);
            for item in &parsed {
                s.upsert_source(item.source_uuid, &item.source_name);
                discovered.insert(item.source_uuid);
                if item.is_group {
                    group_uuids.insert(item.source_uuid);
                    s.patch_source(item.source_uuid, |rec| rec.is_group = true);
                }
            }
            s.set_scene_items(scene_uuid, parsed);
        }
    }

    // 6a, continued: nested item lists for every group
    if !group_uuids.is_empty() {
        let items = group_uuids
            .iter()
            .map(|uuid| {
                BatchItem::new(
                    "GetGroupSceneItemList",
                    &uuid.to_string(),
                    Some(json!({ "sceneUuid": uuid.to_string() })),
                )
            })
            .collect();
        let results = gateway.send_batch(items).await;
        let mut s = store.write().await;
        if !s.accepts(generation) {
            return;
        }
        for r in results {
            let Ok(group_uuid) = Uuid::parse_str(&r.request_id) else {
                continue;
            };
            if !r.success {
                debug!("[Bootstrap] no item list for group {}", group_uuid);
                continue;
            }
            let Some(data) = r.response_data else { continue };
            let group_name = s
                .source(group_uuid)
                .map(|rec| rec.source_name.clone())
                .unwrap_or_default();
            let parsed = parse_scene_items(&data);
            for item in &parsed {
                s.upsert_source(item.source_uuid, &item.source_name);
                discovered.insert(item.source_uuid);
                s.patch_source(item.source_uuid, |rec| {
                    rec.group_name = Some(group_name.clone());
                });
            }
            s.set_group_items(group_uuid, parsed);
        }
    }

    // 6b: one combined detail batch over the union, request ids "<uuid>:<field>"
    let mut items: Vec<BatchItem> = Vec::new();
    {
        let s = store.read().await;
        for uuid in &discovered {
            let id = uuid.to_string();
            items.push(BatchItem::new(
                "GetSourceActive",
                &format!("{id}:active"),
                Some(json!({ "sourceUuid": id })),
            ));
            items.push(BatchItem::new(
                "GetSourceFilterList",
                &format!("{id}:filters"),
                Some(json!({ "sourceUuid": id })),
            ));
            // only real inputs have settings/audio; bare scene references
            // and groups do not
            let has_kind = s
                .source(*uuid)
                .and_then(|rec| rec.input_kind.as_ref())
                .is_some();
            if !has_kind {
                continue;
            }
            let input = json!({ "inputUuid": id });
            for (request_type, field) in [
                ("GetInputSettings", "settings"),
                ("GetInputMute", "mute"),
                ("GetInputVolume", "volume"),
                ("GetInputAudioBalance", "balance"),
                ("GetInputAudioSyncOffset", "syncOffset"),
                ("GetInputAudioMonitorType", "monitor"),
                ("GetInputAudioTracks", "tracks"),
            ] {
                items.push(BatchItem::new(
                    request_type,
                    &format!("{id}:{field}"),
                    Some(input.clone()),
                ));
            }
            let is_media = s
                .source(*uuid)
                .and_then(|rec| rec.input_kind.as_deref())
                .map(is_media_kind)
                .unwrap_or(false);
            if is_media {
                items.push(BatchItem::new(
                    "GetMediaInputStatus",
                    &format!("{id}:media"),
                    Some(input),
                ));
            }
        }
    }

    let results = gateway.send_batch(items).await;
    let mut s = store.write().await;
    if !s.accepts(generation) {
        return;
    }
    for r in results.into_iter().filter(|r| r.success) {
        let Some((uuid_part, field)) = r.request_id.split_once(':') else {
            continue;
        };
        let Ok(uuid) = Uuid::parse_str(uuid_part) else {
            continue;
        };
        let Some(data) = r.response_data else { continue };
        apply_source_detail(&mut s, uuid, field, &data);
    }
}

fn apply_source_detail(s: &mut crate::store::StateStore, uuid: Uuid, field: &str, data: &Value) {
    match field {
        "active" => {
            s.patch_source(uuid, |rec| {
                rec.active = data["videoActive"].as_bool().unwrap_or(false);
                rec.video_showing = data["videoShowing"].as_bool().unwrap_or(false);
            });
        }
        "filters" => {
            if let Some(filters) = data["filters"].as_array() {
                s.set_filters(
                    uuid,
                    filters
                        .iter()
                        .map(|f| FilterRecord {
                            filter_name: str_field(f, "filterName"),
                            filter_kind: str_field(f, "filterKind"),
                            enabled: f["filterEnabled"].as_bool().unwrap_or(false),
                            filter_index: f["filterIndex"].as_u64().unwrap_or(0) as u32,
                        })
                        .collect(),
                );
            }
        }
        "settings" => {
            if let Some(Value::Object(overrides)) = data.get("inputSettings") {
                let overrides = overrides.clone();
                s.patch_source(uuid, |rec| {
                    if rec.input_kind.is_none() {
                        rec.input_kind = data["inputKind"].as_str().map(String::from);
                    }
                });
                s.apply_input_settings(uuid, &overrides);
            }
        }
        "mute" => {
            let muted = data["inputMuted"].as_bool().unwrap_or(false);
            s.patch_source(uuid, |rec| {
                rec.audio.get_or_insert_with(AudioState::default).muted = muted;
            });
        }
        "volume" => {
            let db = data["inputVolumeDb"].as_f64().unwrap_or(0.0);
            let mul = data["inputVolumeMul"].as_f64().unwrap_or(0.0);
            s.patch_source(uuid, |rec| {
                let audio = rec.audio.get_or_insert_with(AudioState::default);
                audio.volume_db = db;
                audio.volume_mul = mul;
            });
        }
        "balance" => {
            let balance = data["inputAudioBalance"].as_f64().unwrap_or(0.5);
            s.patch_source(uuid, |rec| {
                rec.audio.get_or_insert_with(AudioState::default).balance = balance;
            });
        }
        "syncOffset" => {
            let offset = data["inputAudioSyncOffset"].as_i64().unwrap_or(0);
            s.patch_source(uuid, |rec| {
                rec.audio.get_or_insert_with(AudioState::default).sync_offset_ms = offset;
            });
        }
        "monitor" => {
            let monitor = str_field(data, "monitorType");
            s.patch_source(uuid, |rec| {
                rec.audio.get_or_insert_with(AudioState::default).monitor_type = monitor;
            });
        }
        "tracks" => {
            if let Some(Value::Object(tracks)) = data.get("inputAudioTracks") {
                let tracks = tracks.clone();
                s.patch_source(uuid, |rec| {
                    rec.audio.get_or_insert_with(AudioState::default).tracks = tracks;
                });
            }
        }
        "media" => {
            let media = MediaState {
                status: MediaStatus::from_wire(data["mediaState"].as_str().unwrap_or("")),
                cursor_ms: data["mediaCursor"].as_i64().unwrap_or(0),
                duration_ms: data["mediaDuration"].as_i64().unwrap_or(0),
            };
            s.patch_source(uuid, |rec| rec.media = Some(media));
        }
        other => debug!("[Bootstrap] unknown detail field {}", other),
    }
}

pub(crate) fn parse_scene_items(data: &Value) -> Vec<SceneItem> {
    data["sceneItems"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(SceneItem {
                        scene_item_id: item["sceneItemId"].as_i64()?,
                        source_uuid: uuid_field(item, "sourceUuid")?,
                        source_name: str_field(item, "sourceName"),
                        enabled: item["sceneItemEnabled"].as_bool().unwrap_or(false),
                        is_group: item["isGroup"].as_bool().unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn str_field(v: &Value, field: &str) -> String {
    v[field].as_str().unwrap_or_default().to_string()
}

pub(crate) fn uuid_field(v: &Value, field: &str) -> Option<Uuid> {
    v[field].as_str().and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use obslink_protocol::message::ServerMessage;
    use tokio::sync::mpsc;

    /// Plays the OBS side: answers single requests and batches alike.
    /// `respond(request_type, request_data)` returns `Some(responseData)`
    /// for a success and `None` for a failure.
    fn spawn_obs(
        gateway: Arc<Gateway>,
        mut outbound_rx: mpsc::Receiver<String>,
        respond: impl Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let v: Value = serde_json::from_str(&frame).unwrap();
                let answer_one = |d: &Value| -> Value {
                    let request_type = d["requestType"].as_str().unwrap();
                    match respond(request_type, &d["requestData"]) {
                        Some(data) => json!({
                            "requestType": request_type,
                            "requestId": d["requestId"],
                            "requestStatus": { "result": true, "code": 100 },
                            "responseData": data
                        }),
                        None => json!({
                            "requestType": request_type,
                            "requestId": d["requestId"],
                            "requestStatus": { "result": false, "code": 600, "comment": "simulated failure" }
                        }),
                    }
                };
                match v["op"].as_u64().unwrap() {
                    6 => {
                        let txt = json!({ "op": 7, "d": answer_one(&v["d"]) }).to_string();
                        match ServerMessage::parse(&txt).unwrap() {
                            ServerMessage::RequestResponse(r) => gateway.complete(r),
                            _ => unreachable!(),
                        }
                    }
                    8 => {
                        let results: Vec<Value> = v["d"]["requests"]
                            .as_array()
                            .unwrap()
                            .iter()
                            .map(answer_one)
                            .collect();
                        let txt = json!({
                            "op": 9,
                            "d": { "requestId": v["d"]["requestId"], "results": results }
                        })
                        .to_string();
                        match ServerMessage::parse(&txt).unwrap() {
                            ServerMessage::RequestBatchResponse(r) => gateway.complete_batch(r),
                            _ => unreachable!(),
                        }
                    }
                    _ => {}
                }
            }
        });
    }

    fn scene_uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn partial_item_list_batch_keeps_the_rest_of_the_graph() {
        let store = store::shared();
        let (tx, rx) = mpsc::channel(64);
        let gateway = Gateway::new(tx, store.clone());
        let polls = PollLoops::new();

        let cam = scene_uuid(10);
        let clip = scene_uuid(11);
        let mic = scene_uuid(12);
        spawn_obs(gateway.clone(), rx, move |request_type, data| {
            match request_type {
                "GetSceneTransitionList" => Some(json!({ "transitions": [
                    { "transitionName": "Cut", "transitionKind": "cut_transition", "transitionFixed": true }
                ] })),
                "GetCurrentSceneTransition" => {
                    Some(json!({ "transitionName": "Cut", "transitionDuration": 300 }))
                }
                "GetSpecialInputs" => Some(json!({ "mic1": "Mic" })),
                "GetInputList" => Some(json!({ "inputs": [
                    { "inputUuid": scene_uuid(12).to_string(), "inputName": "Mic", "inputKind": "wasapi_input_capture" },
                    { "inputUuid": scene_uuid(11).to_string(), "inputName": "Clip", "inputKind": "ffmpeg_source" }
                ] })),
                "GetSceneList" => Some(json!({
                    "scenes": [
                        { "sceneUuid": scene_uuid(1).to_string(), "sceneName": "A", "sceneIndex": 0 },
                        { "sceneUuid": scene_uuid(2).to_string(), "sceneName": "B", "sceneIndex": 1 },
                        { "sceneUuid": scene_uuid(3).to_string(), "sceneName": "C", "sceneIndex": 2 }
                    ],
                    "currentProgramSceneUuid": scene_uuid(1).to_string(),
                    "currentProgramSceneName": "A"
                })),
                "GetSceneItemList" => {
                    let scene = data["sceneUuid"].as_str().unwrap();
                    if scene == scene_uuid(2).to_string() {
                        // scene B's fetch fails; the rest of the batch proceeds
                        None
                    } else if scene == scene_uuid(1).to_string() {
                        Some(json!({ "sceneItems": [{
                            "sceneItemId": 1,
                            "sourceUuid": scene_uuid(10).to_string(),
                            "sourceName": "Cam",
                            "sceneItemEnabled": true,
                            "isGroup": false
                        }] }))
                    } else {
                        Some(json!({ "sceneItems": [{
                            "sceneItemId": 2,
                            "sourceUuid": scene_uuid(11).to_string(),
                            "sourceName": "Clip",
                            "sceneItemEnabled": false,
                            "isGroup": false
                        }] }))
                    }
                }
                // source detail calls all fail; identities must survive
                _ => None,
            }
        });

        let generation = store.read().await.generation();
        refresh_scene_collection(&gateway, &store, &polls, generation).await;

        let s = store.read().await;
        assert_eq!(s.scene_count(), 3);
        assert_eq!(s.scene_items(scene_uuid(1)).unwrap().len(), 1);
        assert!(s.scene_items(scene_uuid(2)).is_none());
        assert_eq!(s.scene_items(scene_uuid(3)).unwrap().len(), 1);

        // every item-referenced source and every listed input is present
        assert!(s.source(cam).is_some());
        assert!(s.source(clip).is_some());
        assert!(s.source(mic).is_some());
        assert_eq!(s.special_input("mic1"), Some(mic));

        assert_eq!(s.hot.program_scene.as_ref().unwrap().name, "A");
        assert!(s.transition("Cut").is_some());

        // a media-capable input was discovered, so the media poll is armed
        assert!(polls.media.is_running());
    }

    #[tokio::test]
    async fn stage_one_failure_aborts_the_sequence() {
        let store = store::shared();
        let (tx, rx) = mpsc::channel(64);
        let gateway = Gateway::new(tx, store.clone());
        let polls = PollLoops::new();

        spawn_obs(gateway.clone(), rx, |request_type, _| match request_type {
            "GetVersion" => None,
            _ => Some(json!({})),
        });

        let generation = store.read().await.generation();
        let result = run(&gateway, &store, &polls, generation).await;
        assert!(matches!(result, Err(ObsLinkError::Handshake(_))));
        assert!(!polls.stats.is_running());
    }

    #[tokio::test]
    async fn full_sequence_populates_version_profiles_and_stats_poll() {
        let store = store::shared();
        let (tx, rx) = mpsc::channel(64);
        let gateway = Gateway::new(tx, store.clone());
        let polls = PollLoops::new();

        spawn_obs(gateway.clone(), rx, |request_type, _| match request_type {
            "GetVersion" => Some(json!({
                "obsVersion": "30.2.3",
                "obsWebSocketVersion": "5.5.2",
                "platformDescription": "Linux",
                "supportedImageFormats": ["png", "jpg"]
            })),
            "GetStudioModeEnabled" => Some(json!({ "studioModeEnabled": true })),
            "GetProfileList" => Some(json!({
                "profiles": ["Default", "Stream"],
                "currentProfileName": "Stream"
            })),
            "GetSceneCollectionList" => Some(json!({
                "sceneCollections": ["Main"],
                "currentSceneCollectionName": "Main"
            })),
            "GetSceneList" => Some(json!({ "scenes": [] })),
            _ => Some(json!({})),
        });

        let generation = store.read().await.generation();
        run(&gateway, &store, &polls, generation).await.unwrap();

        let s = store.read().await;
        assert_eq!(s.version.as_ref().unwrap().obs_version, "30.2.3");
        assert!(s.hot.studio_mode);
        assert_eq!(s.hot.current_profile.as_deref(), Some("Stream"));
        assert_eq!(s.hot.current_scene_collection.as_deref(), Some("Main"));
        assert!(polls.stats.is_running());
    }

    #[test]
    fn parse_scene_items_skips_malformed_entries() {
        let data = json!({
            "sceneItems": [
                {
                    "sceneItemId": 1,
                    "sourceUuid": Uuid::from_u128(1).to_string(),
                    "sourceName": "Cam",
                    "sceneItemEnabled": true,
                    "isGroup": false
                },
                { "sceneItemId": "not-a-number" }
            ]
        });
        let items = parse_scene_items(&data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_name, "Cam");
        assert!(items[0].enabled);
    }
}
