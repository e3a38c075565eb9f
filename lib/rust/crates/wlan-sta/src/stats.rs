// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Counters of races and ordering violations a session absorbed instead of failing on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Association outcomes that arrived after a local disconnect request.
    pub suppressed_connect_results: u32,
    /// Events re-delivered for a transition that already happened.
    pub duplicate_events: u32,
    /// Events that made no sense in the current connection state.
    pub unexpected_events: u32,
    pub unknown_events: u32,
    pub orphan_key_completions: u32,
    pub failed_key_completions: u32,
    /// Deferred key contexts overwritten before the roam completed.
    pub stale_deferred_keys: u32,
    pub double_deregistrations: u32,
    pub stale_tasks: u32,
    pub mic_failures: u32,
    pub roams_permitted: u32,
    pub roams_denied: u32,
    pub roams_completed: u32,
    pub roams_abandoned: u32,
    /// Disassociations from the previous BSS absorbed during a fast transition.
    pub roam_disassociations_absorbed: u32,
}

impl SessionStats {
    /// Counts an orphan key completion. Returns true once the count crosses `threshold`.
    pub fn record_orphan_key(&mut self, threshold: u32) -> bool {
        self.orphan_key_completions = self.orphan_key_completions.saturating_add(1);
        self.orphan_key_completions > threshold
    }
}
