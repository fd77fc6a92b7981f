//! Listener-side connection supervisor.
//!
//! # Architecture
//!
//! ```text
//! SupervisorHandle ──commands (mpsc)──▶ ConnectionSupervisor::run()  ← tokio task
//!   connect / disconnect                   │  owns ListenerSession (state, intent, last seq)
//!                                          │
//!                                          ├─ Disconnected: wait for command / retry backoff
//!                                          ├─ Connecting:   transport.connect() within fallback timeout
//!                                          ├─ Live:         channel.recv() → Subtitle / Gap
//!                                          └─ Simulating:   scripted line every cadence
//!                                          │
//! listener UI ◀──SupervisorEvent (mpsc)────┘
//! ```
//!
//! Every transition goes through [`ListenerSession::apply`], i.e. through the
//! pure [`ConnectionState::on`] table, so the run loop holds no transition
//! logic of its own.

pub mod poll;
pub mod session;
pub mod simulate;
pub mod state;
pub mod transport;

pub use poll::HttpPollTransport;
pub use session::ListenerSession;
pub use simulate::SimulatedFeed;
pub use state::{ConnectionState, Trigger};
pub use transport::{LocalBusTransport, SubtitleChannel, SubtitleTransport, TransportError};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::bus::SubtitleEvent;
use crate::clock::Clock;
use crate::config::SupervisorConfig;
use crate::room::RoomId;

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// What the listener UI is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    StateChanged(ConnectionState),
    Subtitle {
        event: SubtitleEvent,
        /// `true` for placeholder lines from degraded mode.
        simulated: bool,
    },
    /// Live events were missed (lagging or across a reconnect).
    Gap { missed: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    Connect,
    Disconnect,
}

/// Control handle for a spawned supervisor.
pub struct SupervisorHandle {
    commands: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Connect, or force a reconnect from simulated mode.
    pub async fn connect(&self) {
        let _ = self.commands.send(SupervisorCommand::Connect).await;
    }

    /// Disconnect and suppress auto-retry until the next `connect`.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(SupervisorCommand::Disconnect).await;
    }

    /// End the supervisor task (the listener navigated away).
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// ConnectionSupervisor
// ---------------------------------------------------------------------------

enum Step {
    Exit,
    Fire(Trigger),
}

pub struct ConnectionSupervisor {
    session: ListenerSession,
    transport: Arc<dyn SubtitleTransport>,
    config: SupervisorConfig,
    clock: Arc<dyn Clock>,
    simulated: SimulatedFeed,
    commands: mpsc::Receiver<SupervisorCommand>,
    events: mpsc::Sender<SupervisorEvent>,
}

impl ConnectionSupervisor {
    /// Spawn a supervisor for `room`.  It starts `Disconnected` and waits
    /// for [`SupervisorHandle::connect`].
    pub fn spawn(
        room: RoomId,
        transport: Arc<dyn SubtitleTransport>,
        config: SupervisorConfig,
        clock: Arc<dyn Clock>,
    ) -> (SupervisorHandle, mpsc::Receiver<SupervisorEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(64);

        let supervisor = Self {
            session: ListenerSession::new(room),
            transport,
            config,
            clock,
            simulated: SimulatedFeed::new(room),
            commands: cmd_rx,
            events: event_tx,
        };
        let task = tokio::spawn(supervisor.run());

        (
            SupervisorHandle {
                commands: cmd_tx,
                task,
            },
            event_rx,
        )
    }

    async fn run(mut self) {
        let room = self.session.room();
        let mut channel: Option<Box<dyn SubtitleChannel>> = None;

        loop {
            let step = match self.session.state() {
                ConnectionState::Disconnected => self.while_disconnected().await,
                ConnectionState::Connecting => match self.handshake().await {
                    Ok(ch) => {
                        channel = Some(ch);
                        Step::Fire(Trigger::HandshakeOk)
                    }
                    Err(step) => step,
                },
                ConnectionState::Live => match channel.as_mut() {
                    Some(ch) => self.while_live(ch.as_mut()).await,
                    None => Step::Fire(Trigger::ChannelClosed),
                },
                ConnectionState::Simulating => self.while_simulating().await,
            };

            let trigger = match step {
                Step::Exit => break,
                Step::Fire(trigger) => trigger,
            };
            if let Some(state) = self.session.apply(trigger) {
                if !state.is_live() {
                    channel = None;
                }
                log::info!("supervisor[{room}]: {state} (on {trigger:?})");
                self.emit(SupervisorEvent::StateChanged(state));
            }
        }
        log::debug!("supervisor[{room}]: handle dropped, exiting");
    }

    // -----------------------------------------------------------------------
    // Per-state behaviour
    // -----------------------------------------------------------------------

    async fn while_disconnected(&mut self) -> Step {
        if !self.session.should_retry() {
            return on_command(self.commands.recv().await);
        }
        let backoff = self.config.retry_backoff();
        tokio::select! {
            _ = tokio::time::sleep(backoff) => Step::Fire(Trigger::Connect),
            cmd = self.commands.recv() => on_command(cmd),
        }
    }

    async fn handshake(&mut self) -> Result<Box<dyn SubtitleChannel>, Step> {
        let room = self.session.room();
        let resume_after = self.session.last_sequence();
        let limit = self.config.fallback_timeout();
        let transport = Arc::clone(&self.transport);

        tokio::select! {
            attempt = tokio::time::timeout(limit, transport.connect(room, resume_after)) => match attempt {
                Ok(Ok(channel)) => Ok(channel),
                Ok(Err(e)) => {
                    log::warn!("supervisor[{room}]: {e}");
                    Err(Step::Fire(Trigger::HandshakeFailed))
                }
                Err(_) => {
                    log::warn!("supervisor[{room}]: no handshake within {limit:?}");
                    Err(Step::Fire(Trigger::HandshakeTimeout))
                }
            },
            cmd = self.commands.recv() => Err(on_command(cmd)),
        }
    }

    async fn while_live(&mut self, channel: &mut dyn SubtitleChannel) -> Step {
        let silence = self.config.live_silence_timeout();
        let next = async {
            match silence {
                Some(limit) => tokio::time::timeout(limit, channel.recv()).await.ok(),
                None => Some(channel.recv().await),
            }
        };

        tokio::select! {
            received = next => match received {
                Some(Some(event)) => {
                    self.deliver_live(event);
                    Step::Fire(Trigger::EventReceived)
                }
                Some(None) => Step::Fire(Trigger::ChannelClosed),
                None => Step::Fire(Trigger::SilenceTimeout),
            },
            cmd = self.commands.recv() => on_command(cmd),
        }
    }

    async fn while_simulating(&mut self) -> Step {
        // First tick completes immediately: a line appears as soon as we enter.
        let mut ticker = tokio::time::interval(self.config.simulation_cadence());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let event = self.simulated.next_event(self.clock.now_millis());
                    self.emit(SupervisorEvent::Subtitle { event, simulated: true });
                }
                cmd = self.commands.recv() => return on_command(cmd),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn deliver_live(&mut self, event: SubtitleEvent) {
        let Some(missed) = self.session.observe(event.sequence) else {
            return;
        };
        if missed > 0 {
            log::debug!(
                "supervisor[{}]: missed {missed} live events",
                self.session.room()
            );
            self.emit(SupervisorEvent::Gap { missed });
        }
        self.emit(SupervisorEvent::Subtitle {
            event,
            simulated: false,
        });
    }

    /// Never waits: commands must stay responsive even when the listener UI
    /// stops draining its events.
    fn emit(&self, event: SupervisorEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!(
                    "supervisor[{}]: event queue full, dropping {event:?}",
                    self.session.room()
                );
            }
        }
    }
}

fn on_command(cmd: Option<SupervisorCommand>) -> Step {
    match cmd {
        Some(SupervisorCommand::Connect) => Step::Fire(Trigger::Connect),
        Some(SupervisorCommand::Disconnect) => Step::Fire(Trigger::UserDisconnect),
        None => Step::Exit,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
