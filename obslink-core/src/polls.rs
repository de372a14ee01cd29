//! src/polls.rs
//!
//! Timer-driven refresh loops for state the event stream does not push
//! promptly: global statistics / output status, and media playback position.
//! Both loops no-op while the scene-collection-changing guard is set and
//! discard results from a superseded connection generation.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use obslink_common::models::source::{MediaState, MediaStatus};
use obslink_common::models::status::StatsSnapshot;

use crate::gateway::{BatchItem, Gateway};
use crate::store::SharedStore;

pub const STATS_INTERVAL: Duration = Duration::from_secs(1);
pub const MEDIA_INTERVAL: Duration = Duration::from_millis(500);

/// Owns at most one running poll task. Starting replaces (aborts) any
/// previous task, so duplicate timers cannot accumulate.
#[derive(Default)]
pub struct PollHandle {
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PollHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, handle: JoinHandle<()>) {
        let mut guard = self.task.lock().unwrap();
        if let Some(old) = guard.take() {
            old.abort();
        }
        *guard = Some(handle);
    }

    pub fn stop(&self) {
        if let Some(old) = self.task.lock().unwrap().take() {
            old.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

/// The two poll loops for one module instance.
#[derive(Default)]
pub struct PollLoops {
    pub stats: PollHandle,
    pub media: PollHandle,
}

impl PollLoops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_all(&self) {
        self.stats.stop();
        self.media.stop();
    }

    pub fn start_stats(&self, gateway: Arc<Gateway>, store: SharedStore, generation: u64) {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(STATS_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                stats_tick(&gateway, &store, generation).await;
            }
        });
        self.stats.replace(handle);
    }

    /// Armed lazily the first time a media-kind input is discovered; the
    /// task exits on its own once no media sources remain.
    pub fn start_media(&self, gateway: Arc<Gateway>, store: SharedStore, generation: u64) {
        if self.media.is_running() {
            return;
        }
        let handle = tokio::spawn(async move {
            let mut ticker = interval(MEDIA_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !media_tick(&gateway, &store, generation).await {
                    debug!("[MediaPoll] no media sources remain, stopping");
                    break;
                }
            }
        });
        self.media.replace(handle);
    }
}

async fn stats_tick(gateway: &Gateway, store: &SharedStore, generation: u64) {
    if !store.read().await.accepts(generation) {
        return;
    }

    if let Some(data) = gateway.send("GetStats", None).await {
        let snap = StatsSnapshot {
            cpu_usage: data["cpuUsage"].as_f64().unwrap_or(0.0),
            memory_usage: data["memoryUsage"].as_f64().unwrap_or(0.0),
            available_disk_space: data["availableDiskSpace"].as_f64().unwrap_or(0.0),
            active_fps: data["activeFps"].as_f64().unwrap_or(0.0),
            average_frame_render_time: data["averageFrameRenderTime"].as_f64().unwrap_or(0.0),
            render_skipped_frames: data["renderSkippedFrames"].as_u64().unwrap_or(0),
            render_total_frames: data["renderTotalFrames"].as_u64().unwrap_or(0),
            output_skipped_frames: data["outputSkippedFrames"].as_u64().unwrap_or(0),
            output_total_frames: data["outputTotalFrames"].as_u64().unwrap_or(0),
        };
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.hot.stats = snap;
        }
    }

    let (streaming, recording, outputs) = {
        let s = store.read().await;
        (
            s.hot.stream.is_active(),
            s.hot.record.is_active(),
            s.output_names(),
        )
    };

    // conditional refreshes are cost reduction, not correctness: the event
    // stream covers the common case, the poll catches drift
    if streaming
        && let Some(data) = gateway.send("GetStreamStatus", None).await
    {
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.hot.stream_congestion = data["outputCongestion"].as_f64().unwrap_or(0.0);
            s.hot.stream_bytes = data["outputBytes"].as_u64().unwrap_or(0);
            s.hot.stream_duration_ms = data["outputDuration"].as_u64().unwrap_or(0);
        }
    }

    if recording
        && let Some(data) = gateway.send("GetRecordStatus", None).await
    {
        let mut s = store.write().await;
        if s.accepts(generation) {
            s.hot.record_duration_ms = data["outputDuration"].as_u64().unwrap_or(0);
        }
    }

    if !outputs.is_empty() {
        let items = outputs
            .iter()
            .map(|name| {
                BatchItem::new(
                    "GetOutputStatus",
                    name,
                    Some(json!({ "outputName": name })),
                )
            })
            .collect();
        let results = gateway.send_batch(items).await;
        let mut s = store.write().await;
        if s.accepts(generation) {
            for r in results.into_iter().filter(|r| r.success) {
                if let Some(data) = r.response_data {
                    s.set_output_active(&r.request_id, data["outputActive"].as_bool().unwrap_or(false));
                }
            }
        }
    }
}

/// Returns false once there is nothing left to poll.
async fn media_tick(gateway: &Gateway, store: &SharedStore, generation: u64) -> bool {
    let sources = {
        let s = store.read().await;
        if !s.accepts(generation) {
            // guard flag set or superseded; keep the loop alive, skip the tick
            return s.generation() == generation;
        }
        s.media_sources()
    };
    if sources.is_empty() {
        return false;
    }

    let items = sources
        .iter()
        .map(|uuid| {
            BatchItem::new(
                "GetMediaInputStatus",
                &uuid.to_string(),
                Some(json!({ "inputUuid": uuid.to_string() })),
            )
        })
        .collect();
    let results = gateway.send_batch(items).await;

    let mut s = store.write().await;
    if !s.accepts(generation) {
        return s.generation() == generation;
    }
    for r in results.into_iter().filter(|r| r.success) {
        let Ok(uuid) = Uuid::parse_str(&r.request_id) else {
            continue;
        };
        if let Some(data) = r.response_data {
            s.patch_source(uuid, |rec| {
                rec.media = Some(MediaState {
                    status: MediaStatus::from_wire(data["mediaState"].as_str().unwrap_or("")),
                    cursor_ms: data["mediaCursor"].as_i64().unwrap_or(0),
                    duration_ms: data["mediaDuration"].as_i64().unwrap_or(0),
                });
            });
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    #[tokio::test]
    async fn replace_aborts_the_previous_task() {
        let handle = PollHandle::new();
        let first = tokio::spawn(std::future::pending::<()>());
        handle.replace(first);
        assert!(handle.is_running());

        handle.replace(tokio::spawn(std::future::pending::<()>()));
        assert!(handle.is_running());
        handle.stop();
        sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn media_loop_exits_when_no_media_sources() {
        let store = store::shared();
        let generation = store.write().await.begin_generation();
        let (tx, _rx) = mpsc::channel(16);
        let gateway = Gateway::new(tx, store.clone());

        let loops = PollLoops::new();
        loops.start_media(gateway, store, generation);
        // first tick sees an empty media list and stops the loop
        sleep(Duration::from_secs(2)).await;
        assert!(!loops.media.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn guard_flag_suppresses_stats_writes() {
        let store = store::shared();
        let generation = store.write().await.begin_generation();
        store.write().await.hot.collection_changing = true;

        let (tx, mut rx) = mpsc::channel(16);
        let gateway = Gateway::new(tx, store.clone());
        stats_tick(&gateway, &store, generation).await;

        // guard set: the tick returns before issuing any request
        assert!(rx.try_recv().is_err());
    }
}
