// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        error::Error,
        format::MacFmt,
        forwarding::{ForwardingOps, StationParams, StationState},
        profile::SecurityProfile,
        MacAddr, SessionId, StationId, UNREGISTERED_STATION,
    },
    log::{info, warn},
};

/// Slot reserved for the primary peer: the AP, or the ad-hoc peer data defaults to.
pub const PRIMARY_SLOT: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerKind {
    AccessPoint,
    AdHoc,
    Tdls,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    pub station_id: StationId,
    pub mac: MacAddr,
    pub kind: PeerKind,
    pub ptk_installed: bool,
    pub gtk_installed: bool,
    pub authenticated: bool,
}

/// Fixed-capacity table of the peers a session has registered with the forwarding layer.
#[derive(Debug)]
pub struct PeerTable {
    slots: Vec<Option<PeerEntry>>,
}

impl PeerTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity] }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    pub fn get(&self, slot: usize) -> Option<&PeerEntry> {
        self.slots.get(slot).and_then(|entry| entry.as_ref())
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut PeerEntry> {
        self.slots.get_mut(slot).and_then(|entry| entry.as_mut())
    }

    pub fn primary(&self) -> Option<&PeerEntry> {
        self.get(PRIMARY_SLOT)
    }

    /// Occupied slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PeerEntry)> {
        self.slots.iter().enumerate().filter_map(|(i, entry)| entry.as_ref().map(|e| (i, e)))
    }

    pub fn find_by_mac(&self, mac: &MacAddr) -> Option<usize> {
        self.iter().find(|(_, e)| &e.mac == mac).map(|(i, _)| i)
    }

    pub fn find_by_station(&self, station_id: StationId) -> Option<usize> {
        if station_id == UNREGISTERED_STATION {
            return None;
        }
        self.iter().find(|(_, e)| e.station_id == station_id).map(|(i, _)| i)
    }

    fn free_slot(&self, kind: PeerKind) -> Option<usize> {
        let first = match kind {
            PeerKind::AccessPoint => {
                return if self.get(PRIMARY_SLOT).is_none() { Some(PRIMARY_SLOT) } else { None };
            }
            PeerKind::AdHoc => PRIMARY_SLOT,
            PeerKind::Tdls => PRIMARY_SLOT + 1,
        };
        (first..self.slots.len()).find(|i| self.slots[*i].is_none())
    }

    fn take(&mut self, slot: usize) -> Option<PeerEntry> {
        self.slots.get_mut(slot).and_then(|entry| entry.take())
    }

    /// Moves the lowest occupied slot into the vacant primary slot. Returns the slot moved from.
    pub fn rehome_primary(&mut self) -> Option<usize> {
        if self.get(PRIMARY_SLOT).is_some() {
            return None;
        }
        let from = self.iter().map(|(i, _)| i).next()?;
        self.slots.swap(PRIMARY_SLOT, from);
        Some(from)
    }
}

/// Forwarding-layer state a freshly registered peer starts in.
pub fn initial_station_state(security: SecurityProfile) -> StationState {
    if security.requires_upper_layer_auth() {
        StationState::Connected
    } else {
        StationState::Authenticated
    }
}

/// Registers `mac` with the forwarding layer and records it in the table.
///
/// A peer already present is not registered again. A full table fails before the forwarding
/// layer is called; a forwarding failure leaves no slot behind.
pub fn register_peer<F: ForwardingOps>(
    table: &mut PeerTable,
    forwarding: &mut F,
    session: SessionId,
    mac: MacAddr,
    kind: PeerKind,
    security: SecurityProfile,
    qos_enabled: bool,
) -> Result<StationId, Error> {
    if let Some(entry) = table.find_by_mac(&mac).and_then(|slot| table.get(slot)) {
        warn!("{}: peer {} already registered", session, mac.to_mac_str());
        return Ok(entry.station_id);
    }
    if kind == PeerKind::AccessPoint {
        if let Some(stale) = table.primary().map(|e| e.station_id) {
            warn!(
                "{}: replacing stale primary peer before registering {}",
                session,
                mac.to_mac_str()
            );
            deregister_peer(table, forwarding, session, stale);
        }
    }
    let slot =
        table.free_slot(kind).ok_or(Error::PeerTableFull { capacity: table.capacity() })?;
    let initial_state = initial_station_state(security);
    let params = StationParams { mac, qos_enabled, initial_state };
    let station_id = forwarding
        .register_station(session, params)
        .map_err(|source| Error::Forwarding { mac, source })?;
    table.slots[slot] = Some(PeerEntry {
        station_id,
        mac,
        kind,
        ptk_installed: false,
        gtk_installed: false,
        authenticated: initial_state == StationState::Authenticated,
    });
    info!(
        "{}: registered {:?} peer {} as station {} in slot {} ({:?})",
        session,
        kind,
        mac.to_mac_str(),
        station_id,
        slot,
        initial_state
    );
    Ok(station_id)
}

/// Removes a station from the table and the forwarding layer. Unknown ids are a no-op.
pub fn deregister_peer<F: ForwardingOps>(
    table: &mut PeerTable,
    forwarding: &mut F,
    session: SessionId,
    station_id: StationId,
) -> Option<PeerEntry> {
    let entry = table.find_by_station(station_id).and_then(|slot| table.take(slot))?;
    if let Err(e) = forwarding.deregister_station(session, station_id) {
        warn!("{}: forwarding layer failed to deregister station {}: {}", session, station_id, e);
    }
    info!("{}: deregistered peer {} (station {})", session, entry.mac.to_mac_str(), station_id);
    Some(entry)
}

pub fn deregister_all<F: ForwardingOps>(
    table: &mut PeerTable,
    forwarding: &mut F,
    session: SessionId,
) -> Vec<PeerEntry> {
    let ids: Vec<_> = table.iter().map(|(_, e)| e.station_id).collect();
    ids.into_iter().filter_map(|id| deregister_peer(table, forwarding, session, id)).collect()
}
