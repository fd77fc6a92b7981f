//! Broadcast orchestrator.
//!
//! Owns every shared component and the arena of running pipelines:
//!
//! ```text
//!             publish_audio(bytes)
//!                    │
//!                    ▼
//!              AudioIngest ──stamp──▶ FanoutDispatcher ──▶ pipeline[zh]
//!                                                     ├──▶ pipeline[kr]
//!                                                     └──▶ pipeline[vn]
//!                                                             │
//!                      SubtitleBus ◀──publish─────────────────┤
//!                      HeartbeatMonitor ◀──heartbeat──────────┘
//!                             │
//!                      StatusReporter ──▶ status()
//! ```
//!
//! The server and `main` only talk to [`Orchestrator`]; nothing else holds a
//! `RunningPipeline`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::audio::{AudioFrame, AudioIngest};
use crate::bus::SubtitleBus;
use crate::clock::Clock;
use crate::collab::{Collaborators, TrackSink};
use crate::config::AppConfig;
use crate::fanout::{FanoutDispatcher, FanoutError};
use crate::heartbeat::HeartbeatMonitor;
use crate::pipeline::{PipelineDeps, PipelineRunner, RunningPipeline, StopReason};
use crate::room::{Room, RoomId};
use crate::status::{StatusReporter, StatusSnapshot};

pub struct Orchestrator {
    rooms: Vec<Room>,
    deps: PipelineDeps,
    reporter: StatusReporter,
    ingest: AudioIngest,
    pipelines: Mutex<HashMap<RoomId, RunningPipeline>>,
}

impl Orchestrator {
    /// Build the shared components.  No pipeline runs until
    /// [`start_room`](Self::start_room) or [`start_all`](Self::start_all).
    pub fn new(
        config: &AppConfig,
        collaborators: Collaborators,
        tracks: Arc<dyn TrackSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let monitor = Arc::new(HeartbeatMonitor::new(config.liveness.window()));
        let rooms = Room::catalogue();
        let reporter = StatusReporter::new(
            Arc::clone(&monitor),
            rooms.clone(),
            config.rooms.required.clone(),
            Arc::clone(&clock),
        );

        let deps = PipelineDeps {
            dispatcher: Arc::new(FanoutDispatcher::new(config.fanout.mailbox_capacity)),
            bus: Arc::new(SubtitleBus::new(config.bus.pending_capacity)),
            monitor,
            collaborators,
            tracks,
            clock: Arc::clone(&clock),
            config: config.pipeline.clone(),
        };

        Self {
            rooms,
            deps,
            reporter,
            ingest: AudioIngest::new(clock),
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn bus(&self) -> &Arc<SubtitleBus> {
        &self.deps.bus
    }

    pub fn dispatcher(&self) -> &Arc<FanoutDispatcher> {
        &self.deps.dispatcher
    }

    pub fn monitor(&self) -> &Arc<HeartbeatMonitor> {
        &self.deps.monitor
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.deps.clock
    }

    // -----------------------------------------------------------------------
    // Pipeline lifecycle
    // -----------------------------------------------------------------------

    /// Start the pipeline for `id`.  A previous pipeline that already exited
    /// (e.g. after repeated terminal failures) is replaced.
    ///
    /// # Errors
    ///
    /// [`FanoutError::DuplicateRoomAttach`] if the room's pipeline is still
    /// running.
    pub fn start_room(&self, id: RoomId) -> Result<(), FanoutError> {
        let mut pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
        if pipelines.get(&id).is_some_and(|p| !p.is_finished()) {
            return Err(FanoutError::DuplicateRoomAttach(id));
        }

        let running = PipelineRunner::start(Room::for_id(id), self.deps.clone())?;
        if pipelines.insert(id, running).is_some() {
            log::info!("orchestrator: restarted exited pipeline for {id}");
        }
        Ok(())
    }

    /// Start every catalogue room that is not already running.  Returns the
    /// rooms that were started.
    pub fn start_all(&self) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter_map(|room| match self.start_room(room.id) {
                Ok(()) => Some(room.id),
                Err(e) => {
                    log::debug!("orchestrator: skipping {}: {e}", room.id);
                    None
                }
            })
            .collect()
    }

    /// Stop the pipeline for `id` and wait for it (bounded by the stop cap).
    ///
    /// Returns `None` if the room had no pipeline or its step had to be
    /// abandoned.
    pub async fn stop_room(&self, id: RoomId) -> Option<StopReason> {
        let running = self
            .pipelines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)?;
        running.stop().await
    }

    /// Stop (if running) and start again.
    pub async fn restart_room(&self, id: RoomId) -> Result<(), FanoutError> {
        if let Some(reason) = self.stop_room(id).await {
            log::info!("orchestrator: {id} stopped for restart ({reason})");
        }
        self.start_room(id)
    }

    /// Rooms whose pipeline loop is still running.
    pub fn running_rooms(&self) -> Vec<RoomId> {
        let pipelines = self.pipelines.lock().unwrap_or_else(|e| e.into_inner());
        let mut rooms: Vec<RoomId> = pipelines
            .iter()
            .filter(|(_, p)| !p.is_finished())
            .map(|(id, _)| *id)
            .collect();
        rooms.sort();
        rooms
    }

    // -----------------------------------------------------------------------
    // Audio and status
    // -----------------------------------------------------------------------

    /// Stamp one chunk of broadcaster audio and hand it to every attached
    /// room.
    pub fn publish_audio(&self, data: impl Into<Bytes>) -> AudioFrame {
        let frame = self.ingest.stamp(data);
        self.deps.dispatcher.publish(frame.clone());
        frame
    }

    pub fn status(&self) -> StatusSnapshot {
        self.reporter.snapshot()
    }

    /// Stop every pipeline, then close the bus so listeners see end-of-feed.
    pub async fn shutdown(&self) {
        let running: Vec<RunningPipeline> = self
            .pipelines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, p)| p)
            .collect();

        // Signal everyone first so the stop caps overlap.
        for pipeline in &running {
            pipeline.request_stop();
        }
        for pipeline in &running {
            match pipeline.stop().await {
                Some(reason) => log::info!("orchestrator: {} stopped ({reason})", pipeline.room()),
                None => log::warn!("orchestrator: {} did not stop cleanly", pipeline.room()),
            }
        }

        self.deps.bus.close();
        log::info!("orchestrator: shut down");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collab::mock::{
        unavailable, MockSynthesizer, MockTranscriber, MockTranslator, RecordingTracks,
    };
    use crate::collab::Stage;
    use crate::heartbeat::Lifecycle;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn orchestrator(transcriber: MockTranscriber) -> (Orchestrator, Arc<RecordingTracks>) {
        orchestrator_requiring(transcriber, RoomId::ALL.to_vec())
    }

    fn orchestrator_requiring(
        transcriber: MockTranscriber,
        required: Vec<RoomId>,
    ) -> (Orchestrator, Arc<RecordingTracks>) {
        let mut config = AppConfig::default();
        config.pipeline.idle_heartbeat_secs = None;
        config.rooms.required = required;

        let tracks = Arc::new(RecordingTracks::default());
        let collaborators = Collaborators {
            transcriber: Arc::new(transcriber),
            translator: Arc::new(MockTranslator::echo()),
            synthesizer: Arc::new(MockSynthesizer::ok()),
        };
        let orch = Orchestrator::new(
            &config,
            collaborators,
            tracks.clone(),
            Arc::new(ManualClock::new(T0)),
        );
        (orch, tracks)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..1_000 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    // ---- end to end --------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn broadcast_reaches_every_room_in_order() {
        let (orch, tracks) = orchestrator(MockTranscriber::ok("欢迎"));
        let mut feeds: Vec<_> = RoomId::ALL
            .into_iter()
            .map(|room| orch.bus().subscribe(room))
            .collect();

        assert_eq!(orch.start_all(), RoomId::ALL.to_vec());
        for i in 0..5u8 {
            let frame = orch.publish_audio(vec![i; 16]);
            assert_eq!(frame.sequence, u64::from(i) + 1);
        }

        for feed in &mut feeds {
            let sequences: Vec<u64> = {
                let mut got = Vec::new();
                for _ in 0..5 {
                    got.push(feed.next().await.unwrap().event.sequence);
                }
                got
            };
            assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        }
        assert_eq!(tracks.for_room(RoomId::Zh).len(), 5);
        assert_eq!(tracks.for_room(RoomId::Vn).len(), 5);

        let status = orch.status();
        assert!(status.worker_alive);
        let response = status.to_response();
        assert_eq!(response.rooms.chinese, "room_zh");
        assert_eq!(response.rooms.korean, "room_kr");
        assert_eq!(response.rooms.vietnamese, "room_vn");
        assert_eq!(response.last_heartbeat, T0 / 1_000);

        orch.shutdown().await;
        assert!(orch.running_rooms().is_empty());
        assert!(orch.dispatcher().attached_rooms().is_empty());
        assert_eq!(feeds[0].next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_running_is_not_alive() {
        let (orch, _) = orchestrator(MockTranscriber::ok("x"));
        let status = orch.status();
        assert!(!status.worker_alive);
        assert_eq!(status.last_heartbeat, None);
        assert_eq!(orch.publish_audio(vec![0u8; 4]).sequence, 1);
    }

    // ---- lifecycle ---------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_while_running() {
        let (orch, _) = orchestrator(MockTranscriber::ok("x"));
        orch.start_room(RoomId::Kr).unwrap();
        assert_eq!(
            orch.start_room(RoomId::Kr),
            Err(FanoutError::DuplicateRoomAttach(RoomId::Kr))
        );
        assert_eq!(orch.start_all(), vec![RoomId::Zh, RoomId::Vn]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_restart_room() {
        let (orch, _) = orchestrator(MockTranscriber::ok("x"));
        orch.start_room(RoomId::Vn).unwrap();

        assert_eq!(orch.stop_room(RoomId::Vn).await, Some(StopReason::Requested));
        assert_eq!(orch.stop_room(RoomId::Vn).await, None);
        assert_eq!(orch.monitor().lifecycle(RoomId::Vn), Lifecycle::Stopped);

        orch.restart_room(RoomId::Vn).await.unwrap();
        assert_eq!(orch.running_rooms(), vec![RoomId::Vn]);
        assert_eq!(orch.monitor().lifecycle(RoomId::Vn), Lifecycle::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn room_that_stopped_itself_can_be_started_again() {
        let transcriber = MockTranscriber::scripted(
            vec![
                Err(unavailable(Stage::Transcribe)),
                Err(unavailable(Stage::Transcribe)),
                Err(unavailable(Stage::Transcribe)),
            ],
            Ok("又来了".to_string()),
        );
        let (orch, _) = orchestrator(transcriber);
        let mut feed = orch.bus().subscribe(RoomId::Kr);
        orch.start_room(RoomId::Kr).unwrap();

        for _ in 0..3 {
            orch.publish_audio(vec![1u8; 4]);
        }
        let monitor = Arc::clone(orch.monitor());
        wait_until(|| monitor.lifecycle(RoomId::Kr) == Lifecycle::Stopped).await;
        wait_until(|| orch.running_rooms().is_empty()).await;

        orch.start_room(RoomId::Kr).unwrap();
        orch.publish_audio(vec![2u8; 4]);
        let d = feed.next().await.unwrap();
        assert_eq!(d.event.text, "[ko] 又来了");
        assert_eq!(d.event.sequence, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn self_stopped_room_is_not_alive_despite_fresh_heartbeat() {
        let transcriber = MockTranscriber::scripted(
            vec![
                Ok("开始".to_string()),
                Err(unavailable(Stage::Transcribe)),
                Err(unavailable(Stage::Transcribe)),
                Err(unavailable(Stage::Transcribe)),
            ],
            Ok("x".to_string()),
        );
        let (orch, _) = orchestrator_requiring(transcriber, vec![RoomId::Zh]);
        orch.start_room(RoomId::Zh).unwrap();

        orch.publish_audio(vec![1u8; 4]);
        let monitor = Arc::clone(orch.monitor());
        wait_until(|| monitor.last_heartbeat(RoomId::Zh).is_some()).await;
        assert!(orch.status().worker_alive);

        for _ in 0..3 {
            orch.publish_audio(vec![1u8; 4]);
        }
        wait_until(|| monitor.lifecycle(RoomId::Zh) == Lifecycle::Stopped).await;

        // The heartbeat is still inside the window; the room is not.
        assert!(monitor.is_alive(RoomId::Zh, T0));
        let status = orch.status();
        assert!(!status.worker_alive);
        assert!(!status.rooms[&RoomId::Zh].alive);
        assert!(!status.to_response().pipelines["zh"].alive);
    }
}
