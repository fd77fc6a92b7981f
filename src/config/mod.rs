//! Configuration for the broadcast orchestrator.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per subsystem,
//! `AppPaths` for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.  Secrets and the port can be
//! supplied through the environment (`AppConfig::apply_env_overrides`).

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, BusConfig, FanoutConfig, LivenessConfig, PipelineConfig, RoomsConfig,
    ServerConfig, SttConfig, SupervisorConfig, TranslateConfig, TtsConfig,
};
