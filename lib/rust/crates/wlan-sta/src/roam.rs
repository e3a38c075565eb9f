// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{codes::StatusCode, format::MacFmt, key::KeyType, timer::EventId, MacAddr, SessionId},
    log::warn,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoamVariant {
    Legacy,
    FastTransition,
    Cckm,
    OffloadedRoam,
}

/// Per-variant roaming behavior.
#[derive(Debug, PartialEq, Eq)]
pub struct RoamStrategy {
    pub variant: RoamVariant,
    /// Roams are announced with fast-transition start/response events.
    pub uses_fast_transition: bool,
    /// The pairwise key is in place once the reassociation completes, so a group key alone
    /// completes the keys.
    pub ptk_carries_over: bool,
    /// Firmware may roam on its own when asked.
    pub supports_roaming: bool,
}

static ROAM_STRATEGIES: [RoamStrategy; 4] = [
    RoamStrategy {
        variant: RoamVariant::Legacy,
        uses_fast_transition: false,
        ptk_carries_over: false,
        supports_roaming: false,
    },
    RoamStrategy {
        variant: RoamVariant::FastTransition,
        uses_fast_transition: true,
        ptk_carries_over: true,
        supports_roaming: true,
    },
    RoamStrategy {
        variant: RoamVariant::Cckm,
        uses_fast_transition: true,
        ptk_carries_over: true,
        supports_roaming: true,
    },
    RoamStrategy {
        variant: RoamVariant::OffloadedRoam,
        uses_fast_transition: true,
        ptk_carries_over: true,
        supports_roaming: true,
    },
];

impl RoamVariant {
    pub fn strategy(self) -> &'static RoamStrategy {
        &ROAM_STRATEGIES[self as usize]
    }
}

/// Key completions that arrived while their peer was unregistered mid-roam.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredKeyContext {
    pub bssid: MacAddr,
    pub peer_mac: MacAddr,
    pub roam_id: u64,
    pub roam_status: StatusCode,
    pub ptk_complete: bool,
    pub gtk_complete: bool,
    /// Cleared once the context is replayed or dropped.
    pub pending: bool,
}

impl DeferredKeyContext {
    fn record(&mut self, key_type: KeyType) {
        match key_type {
            KeyType::Pairwise => self.ptk_complete = true,
            KeyType::Group => self.gtk_complete = true,
        }
    }

    /// Buffered completions in replay order, pairwise first.
    pub fn key_types(&self) -> Vec<KeyType> {
        let mut keys = vec![];
        if self.ptk_complete {
            keys.push(KeyType::Pairwise);
        }
        if self.gtk_complete {
            keys.push(KeyType::Group);
        }
        keys
    }
}

/// Fast-transition bookkeeping of a session, including the single deferred key slot.
#[derive(Debug)]
pub struct RoamContext {
    strategy: &'static RoamStrategy,
    fast_transition_active: bool,
    roam_id: u64,
    group_key_suffices: bool,
    deferred: Option<DeferredKeyContext>,
    timeout: Option<EventId>,
}

impl RoamContext {
    pub fn new() -> Self {
        Self {
            strategy: RoamVariant::Legacy.strategy(),
            fast_transition_active: false,
            roam_id: 0,
            group_key_suffices: false,
            deferred: None,
            timeout: None,
        }
    }

    /// Starts over for a new association. Roam ids keep increasing across associations.
    pub fn reset(&mut self, variant: RoamVariant) {
        self.strategy = variant.strategy();
        self.fast_transition_active = false;
        self.group_key_suffices = false;
        self.deferred = None;
        self.timeout = None;
    }

    pub fn strategy(&self) -> &'static RoamStrategy {
        self.strategy
    }

    pub fn is_active(&self) -> bool {
        self.fast_transition_active
    }

    pub fn roam_id(&self) -> u64 {
        self.roam_id
    }

    pub fn deferred(&self) -> Option<&DeferredKeyContext> {
        self.deferred.as_ref()
    }

    /// Enters fast transition and returns the new roam id.
    pub fn begin(&mut self) -> u64 {
        self.roam_id += 1;
        self.fast_transition_active = true;
        self.group_key_suffices = false;
        self.deferred = None;
        self.roam_id
    }

    pub fn set_timeout(&mut self, event_id: EventId) {
        self.timeout = Some(event_id);
    }

    pub fn take_timeout(&mut self) -> Option<EventId> {
        self.timeout.take()
    }

    /// Stores a key completion for replay. Completions for the same peer in the same roam share
    /// the pending context. Returns the pending context it displaced, if any.
    pub fn defer(
        &mut self,
        session: SessionId,
        bssid: MacAddr,
        peer_mac: MacAddr,
        key_type: KeyType,
        roam_status: StatusCode,
    ) -> Option<DeferredKeyContext> {
        let roam_id = self.roam_id;
        if let Some(pending) = self
            .deferred
            .as_mut()
            .filter(|d| d.pending && d.peer_mac == peer_mac && d.roam_id == roam_id)
        {
            pending.record(key_type);
            return None;
        }
        let mut entry = DeferredKeyContext {
            bssid,
            peer_mac,
            roam_id,
            roam_status,
            ptk_complete: false,
            gtk_complete: false,
            pending: true,
        };
        entry.record(key_type);
        let stale = self.deferred.replace(entry).filter(|stale| stale.pending);
        if let Some(stale) = &stale {
            warn!(
                "{}: discarding deferred {:?} key completion(s) for {}; superseded during roam {}",
                session,
                stale.key_types(),
                stale.peer_mac.to_mac_str(),
                self.roam_id
            );
        }
        stale
    }

    /// Hands out the pending context once, provided it belongs to the current roam.
    pub fn take_deferred(&mut self, session: SessionId) -> Option<DeferredKeyContext> {
        let roam_id = self.roam_id;
        let deferred = self.deferred.as_mut().filter(|d| d.pending)?;
        deferred.pending = false;
        if deferred.roam_id != roam_id {
            warn!(
                "{}: dropping deferred key completion of roam {}; current roam is {}",
                session, deferred.roam_id, roam_id
            );
            return None;
        }
        Some(deferred.clone())
    }

    /// Leaves fast transition after the new BSS was joined.
    pub fn complete(&mut self) {
        self.fast_transition_active = false;
        self.group_key_suffices = self.strategy.ptk_carries_over;
    }

    /// Leaves fast transition without joining the new BSS. Deferred keys are dropped.
    pub fn abandon(&mut self) {
        self.fast_transition_active = false;
        self.group_key_suffices = false;
        if let Some(deferred) = self.deferred.as_mut() {
            deferred.pending = false;
        }
    }

    pub fn group_key_suffices(&self) -> bool {
        self.strategy.ptk_carries_over && (self.fast_transition_active || self.group_key_suffices)
    }

    /// The peer is authenticated again; later re-keys need both keys.
    pub fn keys_settled(&mut self) {
        self.group_key_suffices = false;
    }
}

impl Default for RoamContext {
    fn default() -> Self {
        Self::new()
    }
}
