//! Engine configuration loaded from an optional TOML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Engine configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded wait for read/write readiness inside `exec`, `expect` and `write`.
    pub poll_timeout_ms: u64,

    /// Maximum bytes a single `write` tick hands to the session.
    pub write_chunk_size: usize,

    /// Maximum bytes pulled from a session per read call.
    pub read_chunk_size: usize,

    /// Most bytes `expect` keeps buffered while nothing matches; older output
    /// is dropped first.
    pub expect_buffer_limit: usize,

    /// Shell used to run `exec` command text (`<shell> -c <text>`).
    pub shell: String,

    /// How long `close` and teardown wait for a child to exit before killing it.
    pub close_grace_ms: u64,

    /// Sleep between ticks when debug tracing is enabled.
    pub debug_tick_delay_ms: u64,

    /// Stop after this many ticks and report `Running`. Unlimited when unset.
    pub max_ticks: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 200,
            write_chunk_size: 256,
            read_chunk_size: 4096,
            expect_buffer_limit: 16 * 1024,
            shell: "/bin/sh".to_string(),
            close_grace_ms: 1000,
            debug_tick_delay_ms: 0,
            max_ticks: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(anyhow!("poll_timeout_ms must be > 0"));
        }
        if self.write_chunk_size == 0 {
            return Err(anyhow!("write_chunk_size must be > 0"));
        }
        if self.read_chunk_size == 0 {
            return Err(anyhow!("read_chunk_size must be > 0"));
        }
        if self.expect_buffer_limit == 0 {
            return Err(anyhow!("expect_buffer_limit must be > 0"));
        }
        if self.shell.trim().is_empty() {
            return Err(anyhow!("shell must be non-empty"));
        }
        if self.close_grace_ms == 0 {
            return Err(anyhow!("close_grace_ms must be > 0"));
        }
        if self.max_ticks == Some(0) {
            return Err(anyhow!("max_ticks must be > 0 when set"));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn debug_tick_delay(&self) -> Duration {
        Duration::from_millis(self.debug_tick_delay_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
