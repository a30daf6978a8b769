//! Engine Configuration Module
//!
//! Language-service, retry and forecast tuning loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `LINECAST_CONFIG` environment variable (path to TOML file)
//! 2. `linecast.toml` in the current working directory
//! 3. Built-in defaults (`config::defaults`)
//!
//! ## Usage
//!
//! Library callers hand an `EngineConfig` to `PredictionEngine::with_config`.
//! The binary also installs it process-wide:
//!
//! ```ignore
//! config::init(EngineConfig::load());
//! let level = config::get().forecast.interval_level;
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;

use std::sync::OnceLock;

/// Process-wide configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the process-wide configuration. Later calls are ignored.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the process-wide configuration, or the defaults if `init()` was
/// never called.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(|| {
        tracing::debug!("config::get() before config::init(), using defaults");
        EngineConfig::default()
    })
}
