//! Pipeline runner: one tokio task per room.
//!
//! [`PipelineRunner::start`] attaches the room to the [`FanoutDispatcher`],
//! spawns the loop and returns a [`RunningPipeline`] handle.  The loop only
//! checks for a stop request *between* steps, so an in-flight collaborator
//! call is allowed to finish or time out.  [`RunningPipeline::stop`] waits at
//! most `stop_cap` for that, then aborts the task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state::{FailureTracker, StepOutcome, StopReason};
use crate::audio::AudioFrame;
use crate::bus::SubtitleBus;
use crate::clock::Clock;
use crate::collab::{with_timeout, CollaboratorError, Collaborators, Stage, TrackSink};
use crate::config::PipelineConfig;
use crate::fanout::{AttachHandle, FanoutDispatcher, FanoutError, FrameReceiver};
use crate::heartbeat::{HeartbeatMonitor, Lifecycle};
use crate::room::{Room, RoomId};

// ---------------------------------------------------------------------------
// PipelineDeps
// ---------------------------------------------------------------------------

/// Everything a pipeline shares with the rest of the orchestrator.
#[derive(Clone)]
pub struct PipelineDeps {
    pub dispatcher: Arc<FanoutDispatcher>,
    pub bus: Arc<SubtitleBus>,
    pub monitor: Arc<HeartbeatMonitor>,
    pub collaborators: Collaborators,
    pub tracks: Arc<dyn TrackSink>,
    pub clock: Arc<dyn Clock>,
    pub config: PipelineConfig,
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

pub struct PipelineRunner {
    room: Room,
    handle: AttachHandle,
    frames: FrameReceiver,
    deps: PipelineDeps,
    failures: FailureTracker,
    stop_rx: watch::Receiver<bool>,
}

/// What woke the loop up.
enum Wake {
    Frame(AudioFrame),
    Idle,
    Closed,
}

impl PipelineRunner {
    /// Attach `room` and spawn its loop.
    ///
    /// # Errors
    ///
    /// [`FanoutError::DuplicateRoomAttach`] if the room already has a pipeline.
    pub fn start(room: Room, deps: PipelineDeps) -> Result<RunningPipeline, FanoutError> {
        let (handle, frames) = deps.dispatcher.attach(room.id)?;
        deps.monitor.set_lifecycle(room.id, Lifecycle::Running);

        let (stop_tx, stop_rx) = watch::channel(false);
        let running = RunningPipeline {
            room: room.id,
            handle,
            stop_tx,
            task: Mutex::new(None),
            dispatcher: Arc::clone(&deps.dispatcher),
            monitor: Arc::clone(&deps.monitor),
            stop_cap: deps.config.stop_cap(),
        };

        let runner = Self {
            failures: FailureTracker::new(deps.config.terminal_failure_threshold),
            room,
            handle,
            frames,
            deps,
            stop_rx,
        };
        let task = tokio::spawn(runner.run());
        *running.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);

        Ok(running)
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    async fn run(mut self) -> StopReason {
        let room = self.room.id;
        log::info!(
            "pipeline[{room}]: started ({})",
            self.room
                .target_language
                .map_or("original audio", |l| l.english_name())
        );
        let idle = self.deps.config.idle_heartbeat();
        // An idle tick only vouches for the room if the last step succeeded.
        let mut last_step_failed = false;

        let reason = loop {
            let wake = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => break StopReason::Requested,
                wake = next_wake(&mut self.frames, idle) => wake,
            };

            let frame = match wake {
                Wake::Frame(frame) => frame,
                Wake::Idle => {
                    if last_step_failed {
                        log::debug!("pipeline[{room}]: idle after a failed step, no heartbeat");
                    } else {
                        self.heartbeat();
                    }
                    continue;
                }
                Wake::Closed => break StopReason::Detached,
            };

            let result = self.step(&frame).await;
            last_step_failed = result.is_err();
            match result {
                Ok(outcome) => {
                    self.failures.record_success();
                    self.heartbeat();
                    if let StepOutcome::Subtitle(event) = outcome {
                        log::debug!(
                            "pipeline[{room}]: frame {} → subtitle #{}",
                            frame.sequence,
                            event.sequence
                        );
                    }
                }
                Err(err) => {
                    let kind = err.kind();
                    self.deps.monitor.record_error(room, kind);
                    log::warn!("pipeline[{room}]: frame {} dropped: {err}", frame.sequence);
                    if self.failures.record_failure(kind) {
                        log::error!(
                            "pipeline[{room}]: {} consecutive terminal failures, stopping",
                            self.failures.streak()
                        );
                        break StopReason::TerminalFailures;
                    }
                }
            }
        };

        self.deps.dispatcher.detach(self.handle);
        self.deps.monitor.set_lifecycle(room, Lifecycle::Stopped);
        log::info!("pipeline[{room}]: stopped ({reason})");
        reason
    }

    /// Run one frame through the collaborators.
    async fn step(&self, frame: &AudioFrame) -> Result<StepOutcome, CollaboratorError> {
        let cfg = &self.deps.config;
        let collab = &self.deps.collaborators;
        let room = self.room.id;

        // The original room carries the broadcaster's audio unchanged.
        if self.room.target_language.is_none() {
            self.deps.tracks.push(room, frame.data.clone());
        }

        let heard = with_timeout(
            Stage::Transcribe,
            cfg.transcribe_timeout(),
            collab.transcriber.transcribe(frame),
        )
        .await?;
        let heard = heard.trim();
        if heard.is_empty() {
            return Ok(StepOutcome::Silence);
        }

        let text = match self.room.target_language {
            Some(lang) => {
                let translated = with_timeout(
                    Stage::Translate,
                    cfg.translate_timeout(),
                    collab.translator.translate(heard, lang),
                )
                .await?;
                let speech = with_timeout(
                    Stage::Synthesize,
                    cfg.synthesize_timeout(),
                    collab.synthesizer.synthesize(&translated, lang),
                )
                .await?;
                self.deps.tracks.push(room, speech);
                translated
            }
            None => heard.to_string(),
        };

        let event = self.deps.bus.publish(room, text, frame.timestamp);
        Ok(StepOutcome::Subtitle(event))
    }

    fn heartbeat(&self) {
        self.deps
            .monitor
            .record_heartbeat(self.room.id, self.deps.clock.now_millis());
    }
}

/// Resolves once a stop is requested or the handle is gone.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn next_wake(frames: &mut FrameReceiver, idle: Option<Duration>) -> Wake {
    let received = match idle {
        Some(limit) => match tokio::time::timeout(limit, frames.recv()).await {
            Ok(received) => received,
            Err(_) => return Wake::Idle,
        },
        None => frames.recv().await,
    };
    match received {
        Some(frame) => Wake::Frame(frame),
        None => Wake::Closed,
    }
}

// ---------------------------------------------------------------------------
// RunningPipeline
// ---------------------------------------------------------------------------

/// Handle to a spawned pipeline.  Dropping it also stops the pipeline.
pub struct RunningPipeline {
    room: RoomId,
    handle: AttachHandle,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<StopReason>>>,
    dispatcher: Arc<FanoutDispatcher>,
    monitor: Arc<HeartbeatMonitor>,
    stop_cap: Duration,
}

impl RunningPipeline {
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// `true` once the loop has exited (or was already reaped by `stop`).
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Ask the loop to exit after its current step, without waiting.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop the pipeline and wait for it, at most `stop_cap`.
    ///
    /// Safe to call concurrently and repeatedly; only the first caller gets
    /// the exit reason.  Returns `None` if another caller already reaped the
    /// task or if it had to be abandoned.
    pub async fn stop(&self) -> Option<StopReason> {
        self.request_stop();
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take()?;

        match tokio::time::timeout(self.stop_cap, &mut task).await {
            Ok(Ok(reason)) => Some(reason),
            Ok(Err(e)) => {
                log::error!("pipeline[{}]: task ended abnormally: {e}", self.room);
                self.release();
                None
            }
            Err(_) => {
                log::warn!(
                    "pipeline[{}]: step still running after {:?}, abandoning it",
                    self.room,
                    self.stop_cap
                );
                task.abort();
                self.release();
                None
            }
        }
    }

    /// Cleanup the loop would have done had it exited normally.
    fn release(&self) {
        self.dispatcher.detach(self.handle);
        self.monitor.set_lifecycle(self.room, Lifecycle::Stopped);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
