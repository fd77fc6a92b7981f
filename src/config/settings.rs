//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a `settings.toml` only needs the
//! keys it wants to change.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::room::RoomId;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP / WebSocket front door.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomsConfig
// ---------------------------------------------------------------------------

/// Which rooms must be alive for the aggregate `worker_alive` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub required: Vec<RoomId>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            required: RoomId::ALL.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// LivenessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// A room is alive while its newest heartbeat is younger than this.
    pub window_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

impl LivenessConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// FanoutConfig / BusConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Pending audio frames per room before the oldest is dropped.
    pub mailbox_capacity: usize,
    /// Buffered chunks per output-track receiver.
    pub track_capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 32,
            track_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Undelivered subtitle events per subscription before the oldest is dropped.
    pub pending_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pending_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Per-room pipeline loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub transcribe_timeout_ms: u64,
    pub translate_timeout_ms: u64,
    pub synthesize_timeout_ms: u64,
    /// Consecutive terminal failures after which the pipeline stops itself.
    pub terminal_failure_threshold: u32,
    /// While no frame arrives for this long, the loop heartbeats anyway.
    /// `None` disables idle heartbeats.
    pub idle_heartbeat_secs: Option<u64>,
    /// How long `stop()` waits for an in-flight step before abandoning it.
    pub stop_cap_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcribe_timeout_ms: 5_000,
            translate_timeout_ms: 5_000,
            synthesize_timeout_ms: 8_000,
            terminal_failure_threshold: 3,
            idle_heartbeat_secs: Some(15),
            stop_cap_secs: 10,
        }
    }
}

impl PipelineConfig {
    pub fn transcribe_timeout(&self) -> Duration {
        millis_at_least_one(self.transcribe_timeout_ms)
    }

    pub fn translate_timeout(&self) -> Duration {
        millis_at_least_one(self.translate_timeout_ms)
    }

    pub fn synthesize_timeout(&self) -> Duration {
        millis_at_least_one(self.synthesize_timeout_ms)
    }

    pub fn idle_heartbeat(&self) -> Option<Duration> {
        self.idle_heartbeat_secs.map(|secs| Duration::from_secs(secs.max(1)))
    }

    pub fn stop_cap(&self) -> Duration {
        Duration::from_secs(self.stop_cap_secs)
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Speech-to-text collaborator (Deepgram-compatible `/v1/listen`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub base_url: String,
    /// Overridden by `DEEPGRAM_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    /// Language the broadcaster speaks, as an ISO-639-1 code.
    pub language: String,
    /// MIME type of the ingested audio frames.
    pub content_type: String,
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepgram.com".into(),
            api_key: None,
            model: "nova-2".into(),
            language: "zh".into(),
            content_type: "audio/wav".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TranslateConfig
// ---------------------------------------------------------------------------

/// Translation collaborator (any OpenAI-compatible `/v1/chat/completions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// - Groq: `https://api.groq.com/openai`
    /// - Ollama (OpenAI mode): `http://localhost:11434`
    pub base_url: String,
    /// Overridden by `GROQ_API_KEY`.  `None` for local providers.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".into(),
            api_key: None,
            model: "llama3-8b-8192".into(),
            temperature: 0.3,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Text-to-speech collaborator (Cartesia-compatible `/tts/bytes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    /// Overridden by `CARTESIA_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    pub voice_id: String,
    /// Value of the `Cartesia-Version` header.
    pub api_version: String,
    pub sample_rate: u32,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cartesia.ai".into(),
            api_key: None,
            model: "sonic-multilingual".into(),
            voice_id: "a0e99841-438c-4a64-b679-ae501e7d6091".into(),
            api_version: "2024-06-10".into(),
            sample_rate: 24_000,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorConfig
// ---------------------------------------------------------------------------

/// Listener-side connection supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Handshake must complete within this or the listener falls back to
    /// simulated subtitles.
    pub fallback_timeout_ms: u64,
    /// Delay before reconnecting after the live channel closes.
    pub retry_backoff_ms: u64,
    /// Interval between simulated subtitle lines.
    pub simulation_cadence_ms: u64,
    /// Fall back to simulation when a live channel stays silent this long.
    /// `None` keeps a quiet live channel live.
    pub live_silence_timeout_ms: Option<u64>,
    /// Poll interval for the HTTP polling transport.
    pub poll_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            fallback_timeout_ms: 5_000,
            retry_backoff_ms: 3_000,
            simulation_cadence_ms: 4_000,
            live_silence_timeout_ms: None,
            poll_interval_ms: 1_000,
        }
    }
}

impl SupervisorConfig {
    pub fn fallback_timeout(&self) -> Duration {
        millis_at_least_one(self.fallback_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        millis_at_least_one(self.retry_backoff_ms)
    }

    pub fn simulation_cadence(&self) -> Duration {
        millis_at_least_one(self.simulation_cadence_ms)
    }

    pub fn live_silence_timeout(&self) -> Option<Duration> {
        self.live_silence_timeout_ms.map(millis_at_least_one)
    }

    pub fn poll_interval(&self) -> Duration {
        millis_at_least_one(self.poll_interval_ms)
    }
}

/// Timer durations are never zero.
fn millis_at_least_one(millis: u64) -> Duration {
    Duration::from_millis(millis.max(1))
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use roomcast::config::AppConfig;
///
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rooms: RoomsConfig,
    pub liveness: LivenessConfig,
    pub fanout: FanoutConfig,
    pub bus: BusConfig,
    pub pipeline: PipelineConfig,
    pub stt: SttConfig,
    pub translate: TranslateConfig,
    pub tts: TtsConfig,
    pub supervisor: SupervisorConfig,
}

impl AppConfig {
    /// Load from the platform `settings.toml`, or defaults when it is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.  A missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save to the platform `settings.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `DEEPGRAM_API_KEY`, `GROQ_API_KEY`, `CARTESIA_API_KEY` and
    /// `PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.  Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("DEEPGRAM_API_KEY") {
            self.stt.api_key = Some(key);
        }
        if let Some(key) = get("GROQ_API_KEY") {
            self.translate.api_key = Some(key);
        }
        if let Some(key) = get("CARTESIA_API_KEY") {
            self.tts.api_key = Some(key);
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .server
                        .bind_addr
                        .rsplit_once(':')
                        .map(|(host, _)| host.to_string())
                        .unwrap_or_else(|| "0.0.0.0".into());
                    self.server.bind_addr = format!("{host}:{port}");
                }
                Err(_) => log::warn!("config: ignoring non-numeric PORT={port:?}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
