// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {crate::config::Config, std::time::Duration};

/// Follow-up work a session defers to the scheduler. Payloads capture the connection or roam
/// they were scheduled for and are re-validated when they fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    /// Forces a pending local disconnect to finish if firmware never confirms it.
    DisconnectCleanupTimeout { connection_id: u64 },
    /// Abandons a fast-transition roam whose response never arrived.
    FastTransitionTimeout { roam_id: u64 },
    /// Looks for other sessions operating on a different channel.
    CheckConcurrentChannel { connection_id: u64 },
}

impl Task {
    pub fn delay(&self, cfg: &Config) -> Duration {
        match self {
            Task::DisconnectCleanupTimeout { .. } => cfg.disconnect_cleanup_timeout(),
            Task::FastTransitionTimeout { .. } => cfg.fast_transition_timeout(),
            Task::CheckConcurrentChannel { .. } => cfg.concurrent_channel_check_delay(),
        }
    }
}
