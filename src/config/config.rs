use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// How long a candidate waits for OK replies from higher nodes (e.g., 2000)
    pub election_timeout_ms: u64,

    /// How long a node that received OK waits for COORDINATOR before
    /// restarting the election. Must exceed election_timeout_ms.
    pub coordinator_timeout_ms: u64,

    /// Delay before the startup leader discovery, lets peers come up
    pub startup_delay_ms: u64,

    /// Random extra delay added on top of startup_delay_ms
    pub startup_jitter_ms: u64,

    /// Events with the same (node, type) inside this window are duplicates
    pub dedup_window_ms: u64,

    /// Number of election events kept in the history
    pub max_history: usize,
}

impl ElectionConfig {
    pub fn election_timeout(&self) -> Duration {
        Duration::from_millis(self.election_timeout_ms)
    }

    pub fn coordinator_timeout(&self) -> Duration {
        Duration::from_millis(self.coordinator_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.election_timeout_ms == 0 {
            return Err("election_timeout must be greater than zero".to_string());
        }

        if self.coordinator_timeout_ms <= self.election_timeout_ms {
            return Err("coordinator_timeout must be greater than election_timeout".to_string());
        }

        if self.max_history == 0 {
            return Err("max_history cannot be zero".to_string());
        }

        Ok(())
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: 2000,
            coordinator_timeout_ms: 4000,
            startup_delay_ms: 500,
            startup_jitter_ms: 250,
            dedup_window_ms: 2000,
            max_history: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Interval between two ping rounds
    pub ping_interval_ms: u64,

    /// Upper bound of a single ping, at most ping_interval_ms
    pub ping_timeout_ms: u64,

    /// Consecutive misses after which a suspected peer is declared dead
    pub dead_after_misses: u32,

    /// The leader audits a heartbeat every N rounds, 0 disables it
    pub heartbeat_audit_rounds: u64,
}

impl DetectorConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ping_interval_ms == 0 {
            return Err("ping_interval must be greater than zero".to_string());
        }

        if self.ping_timeout_ms == 0 || self.ping_timeout_ms > self.ping_interval_ms {
            return Err("ping_timeout must be in (0, ping_interval]".to_string());
        }

        if self.dead_after_misses < 2 {
            return Err("dead_after_misses must be at least 2".to_string());
        }

        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 2000,
            ping_timeout_ms: 1500,
            dead_after_misses: 3,
            heartbeat_audit_rounds: 10,
        }
    }
}

/// Upper bound of seats per row
pub const MAX_COLUMNS: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Seat rows, labelled A, B, C...
    pub rows: u32,

    /// Seats per row, numbered from 1
    pub columns: u32,

    /// Number of latest transactions pushed on every transaction update
    pub transaction_feed_len: usize,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.rows == 0 || self.rows > 26 {
            return Err("rows must be between 1 and 26".to_string());
        }

        if self.columns == 0 || self.columns > MAX_COLUMNS {
            return Err(format!("columns must be between 1 and {}", MAX_COLUMNS));
        }

        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rows: 7,
            columns: 10,
            transaction_feed_len: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout of peer requests
    pub request_timeout_ms: u64,

    /// Frames buffered per event stream before slow subscribers lose the oldest
    pub event_buffer: usize,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 3000,
            event_buffer: 64,
        }
    }
}
