// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{format::MacFmt, MacAddr, SessionId},
    log::warn,
    parking_lot::Mutex,
    std::collections::HashMap,
};

/// State shared by every station session of the process.
///
/// Each session only writes its own entries. The active session count is changed exclusively
/// through [`SharedContext::connection_started`] and [`SharedContext::connection_ended`].
#[derive(Debug, Default)]
pub struct SharedContext {
    inner: Mutex<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    active_sessions: usize,
    operating_channels: HashMap<SessionId, u8>,
    pending_tdls_add: Option<(SessionId, MacAddr)>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_session_count(&self) -> usize {
        self.inner.lock().active_sessions
    }

    /// Records a newly associated session. Returns the updated active count.
    pub fn connection_started(&self, session: SessionId, channel: u8) -> usize {
        let mut inner = self.inner.lock();
        if inner.operating_channels.insert(session, channel).is_none() {
            inner.active_sessions += 1;
        } else {
            warn!(
                "{}: connection started twice; active count left at {}",
                session, inner.active_sessions
            );
        }
        inner.active_sessions
    }

    /// Records the end of a session's connection. Returns the updated active count.
    pub fn connection_ended(&self, session: SessionId) -> usize {
        let mut inner = self.inner.lock();
        if inner.operating_channels.remove(&session).is_some() {
            inner.active_sessions = inner.active_sessions.saturating_sub(1);
        } else {
            warn!("{}: connection ended without being started", session);
        }
        if matches!(inner.pending_tdls_add, Some((owner, _)) if owner == session) {
            inner.pending_tdls_add = None;
        }
        inner.active_sessions
    }

    pub fn update_operating_channel(&self, session: SessionId, channel: u8) {
        if let Some(current) = self.inner.lock().operating_channels.get_mut(&session) {
            *current = channel;
        }
    }

    /// Connected sessions other than `session` whose operating channel differs from `channel`.
    pub fn sessions_off_channel(&self, session: SessionId, channel: u8) -> Vec<(SessionId, u8)> {
        let mut others: Vec<_> = self
            .inner
            .lock()
            .operating_channels
            .iter()
            .filter(|(id, chan)| **id != session && **chan != channel)
            .map(|(id, chan)| (*id, *chan))
            .collect();
        others.sort();
        others
    }

    /// Claims the single process-wide TDLS setup slot. Fails if another setup is in flight.
    pub fn begin_tdls_add(&self, session: SessionId, peer: MacAddr) -> bool {
        let mut inner = self.inner.lock();
        match inner.pending_tdls_add {
            Some(pending) if pending != (session, peer) => {
                warn!(
                    "{}: TDLS setup with {} refused; {} still pending for {}",
                    session,
                    peer.to_mac_str(),
                    pending.1.to_mac_str(),
                    pending.0
                );
                false
            }
            _ => {
                inner.pending_tdls_add = Some((session, peer));
                true
            }
        }
    }

    /// Releases the TDLS setup slot. Returns whether it was held for this peer.
    pub fn finish_tdls_add(&self, session: SessionId, peer: MacAddr) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending_tdls_add == Some((session, peer)) {
            inner.pending_tdls_add = None;
            true
        } else {
            false
        }
    }

    pub fn pending_tdls_add(&self) -> Option<(SessionId, MacAddr)> {
        self.inner.lock().pending_tdls_add
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: MacAddr = [2, 2, 2, 2, 2, 2];

    #[test]
    fn active_count_changes_once_per_connection() {
        let shared = SharedContext::new();
        assert_eq!(shared.connection_started(SessionId(0), 6), 1);
        assert_eq!(shared.connection_started(SessionId(0), 6), 1);
        assert_eq!(shared.connection_started(SessionId(1), 36), 2);
        assert_eq!(shared.connection_ended(SessionId(0)), 1);
        assert_eq!(shared.connection_ended(SessionId(0)), 1);
        assert_eq!(shared.active_session_count(), 1);
    }

    #[test]
    fn sessions_off_channel_skips_self_and_same_channel() {
        let shared = SharedContext::new();
        shared.connection_started(SessionId(0), 6);
        shared.connection_started(SessionId(1), 6);
        shared.connection_started(SessionId(2), 149);
        assert_eq!(shared.sessions_off_channel(SessionId(0), 6), vec![(SessionId(2), 149)]);
        shared.update_operating_channel(SessionId(2), 6);
        assert!(shared.sessions_off_channel(SessionId(0), 6).is_empty());
    }

    #[test]
    fn single_pending_tdls_add() {
        let shared = SharedContext::new();
        assert!(shared.begin_tdls_add(SessionId(0), PEER));
        assert!(shared.begin_tdls_add(SessionId(0), PEER));
        assert!(!shared.begin_tdls_add(SessionId(1), PEER));
        assert!(!shared.finish_tdls_add(SessionId(1), PEER));
        assert!(shared.finish_tdls_add(SessionId(0), PEER));
        assert_eq!(shared.pending_tdls_add(), None);
    }

    #[test]
    fn connection_end_releases_pending_tdls_add() {
        let shared = SharedContext::new();
        shared.connection_started(SessionId(0), 1);
        assert!(shared.begin_tdls_add(SessionId(0), PEER));
        shared.connection_ended(SessionId(0));
        assert_eq!(shared.pending_tdls_add(), None);
    }
}
