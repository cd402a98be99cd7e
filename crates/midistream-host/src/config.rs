use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use midistream_pipe::{PipeId, DEFAULT_CAPACITY, MAX_LONG_EVENT_BYTES, MAX_PIPES};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`StreamMultiplexer`](crate::StreamMultiplexer) run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostConfig {
    /// Number of pipes to open, at most four.
    pub channel_count: usize,
    /// Ring size requested from the driver when no per-pipe override is set.
    pub capacity_hint: usize,
    /// Per-pipe ring size overrides, indexed by pipe ordinal.
    pub capacity_hints: Vec<usize>,
    /// Delay between poll cycles. Zero yields to the scheduler instead.
    pub poll_interval_us: u64,
    /// Total time `stop_all` waits for workers to exit.
    pub join_timeout_ms: u64,
    /// Size of each worker's long event buffer.
    pub long_buffer_bytes: usize,
    /// Per-pipe queue depth for the queue sink.
    pub sink_queue_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            channel_count: 1,
            capacity_hint: DEFAULT_CAPACITY,
            capacity_hints: Vec::new(),
            poll_interval_us: 100,
            join_timeout_ms: 2_000,
            long_buffer_bytes: MAX_LONG_EVENT_BYTES + 1,
            sink_queue_capacity: 4_096,
        }
    }
}

impl HostConfig {
    pub fn with_channel_count(mut self, count: usize) -> Self {
        self.channel_count = count;
        self
    }

    pub fn with_capacity_hint(mut self, capacity: usize) -> Self {
        self.capacity_hint = capacity;
        self
    }

    pub fn with_capacity_hints(mut self, hints: Vec<usize>) -> Self {
        self.capacity_hints = hints;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_us = u64::try_from(interval.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_long_buffer_bytes(mut self, bytes: usize) -> Self {
        self.long_buffer_bytes = bytes;
        self
    }

    pub fn capacity_for(&self, pipe: PipeId) -> usize {
        self.capacity_hints
            .get(pipe.index())
            .copied()
            .unwrap_or(self.capacity_hint)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count > MAX_PIPES {
            return Err(ConfigError::Invalid(format!(
                "channel_count {} exceeds {MAX_PIPES}",
                self.channel_count
            )));
        }
        if self.capacity_hint == 0 || self.capacity_hints.contains(&0) {
            return Err(ConfigError::Invalid("capacity hints must be non-zero".into()));
        }
        if self.long_buffer_bytes == 0 {
            return Err(ConfigError::Invalid("long_buffer_bytes must be non-zero".into()));
        }
        if self.sink_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sink_queue_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// `<config dir>/midistream/host.json`.
pub fn default_path() -> Option<PathBuf> {
    let mut base = dirs::config_dir()?;
    base.push("midistream");
    base.push("host.json");
    Some(base)
}

pub fn load(path: &Path) -> Result<HostConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: HostConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Loads the default config file, falling back to defaults when it is
/// missing or unusable.
pub fn load_or_default() -> HostConfig {
    let Some(path) = default_path() else {
        return HostConfig::default();
    };
    if !path.exists() {
        return HostConfig::default();
    }
    match load(&path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(%err, "ignoring host configuration");
            HostConfig::default()
        }
    }
}
