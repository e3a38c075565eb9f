// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {anyhow::Context as _, serde::Deserialize, std::time::Duration};

pub const DEFAULT_PEER_TABLE_CAPACITY: usize = 8;
pub const DISCONNECT_CLEANUP_TIMEOUT_MILLIS: u64 = 1000;
pub const FAST_TRANSITION_TIMEOUT_MILLIS: u64 = 500;
pub const CONCURRENT_CHANNEL_CHECK_DELAY_MILLIS: u64 = 100;
pub const ORPHAN_KEY_ALARM_THRESHOLD: u32 = 3;

/// Tunables of a station session. Missing JSON fields keep their defaults.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of slots in the per-session peer table. Slot 0 is the primary peer.
    pub peer_table_capacity: usize,
    pub disconnect_cleanup_timeout_ms: u64,
    pub fast_transition_timeout_ms: u64,
    pub concurrent_channel_check_delay_ms: u64,
    /// Orphan key completions past this count are logged as errors instead of warnings.
    pub orphan_key_alarm_threshold: u32,
    pub tdls_supported: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_table_capacity: DEFAULT_PEER_TABLE_CAPACITY,
            disconnect_cleanup_timeout_ms: DISCONNECT_CLEANUP_TIMEOUT_MILLIS,
            fast_transition_timeout_ms: FAST_TRANSITION_TIMEOUT_MILLIS,
            concurrent_channel_check_delay_ms: CONCURRENT_CHANNEL_CHECK_DELAY_MILLIS,
            orphan_key_alarm_threshold: ORPHAN_KEY_ALARM_THRESHOLD,
            tdls_supported: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let cfg: Config = serde_json::from_str(json).context("failed to parse station config")?;
        if cfg.peer_table_capacity == 0 {
            anyhow::bail!("peer_table_capacity must leave room for the primary peer");
        }
        Ok(cfg)
    }

    pub fn with_peer_table_capacity(mut self, capacity: usize) -> Self {
        self.peer_table_capacity = capacity;
        self
    }

    pub fn with_tdls(mut self, supported: bool) -> Self {
        self.tdls_supported = supported;
        self
    }

    pub fn disconnect_cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_cleanup_timeout_ms)
    }

    pub fn fast_transition_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_transition_timeout_ms)
    }

    pub fn concurrent_channel_check_delay(&self) -> Duration {
        Duration::from_millis(self.concurrent_channel_check_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_keeps_defaults_for_missing_fields() {
        let cfg = Config::from_json(r#"{ "peer_table_capacity": 4 }"#).expect("valid config");
        assert_eq!(cfg, Config::default().with_peer_table_capacity(4));
        assert_eq!(cfg.fast_transition_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn from_json_rejects_unknown_field() {
        let e = Config::from_json(r#"{ "peer_table_size": 4 }"#).expect_err("unknown field");
        assert!(format!("{:#}", e).contains("failed to parse station config"));
    }

    #[test]
    fn from_json_rejects_empty_peer_table() {
        Config::from_json(r#"{ "peer_table_capacity": 0 }"#).expect_err("no primary slot");
    }
}
