// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        codes::StatusCode,
        config::Config,
        context::SharedContext,
        dispatch::{Event, EventKind, ResultCode, RoamInfo},
        error::ForwardingError,
        forwarding::{ForwardingOps, StationParams, StationState},
        key::KeyType,
        notify::{Notification, NotificationStream},
        profile::{AuthType, CipherSuite, ConnectionProfile, ProfileSource},
        session::{ConnectRequest, Session},
        timer::{EventId, FakeScheduler},
        MacAddr, SessionId, StationId,
    },
    parking_lot::Mutex,
    std::{collections::HashMap, sync::Arc},
};

pub const CLIENT_SESSION: SessionId = SessionId(0);
pub const AP_BSSID: MacAddr = [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f];
pub const NEW_AP_BSSID: MacAddr = [0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardingCall {
    Register { session: SessionId, params: StationParams },
    Deregister { session: SessionId, station_id: StationId },
    SetState { session: SessionId, station_id: StationId, state: StationState },
    Enable { session: SessionId },
    Disable { session: SessionId },
}

#[derive(Debug)]
pub struct FakeForwardingState {
    next_station_id: StationId,
    pub calls: Vec<ForwardingCall>,
    pub stations: HashMap<StationId, (MacAddr, StationState)>,
    pub forwarding_enabled: bool,
    pub fail_register: Option<ForwardingError>,
    pub fail_enable: Option<ForwardingError>,
    pub fail_set_state: Option<ForwardingError>,
    pub profile: Option<ConnectionProfile>,
}

impl Default for FakeForwardingState {
    fn default() -> Self {
        Self {
            next_station_id: 1,
            calls: vec![],
            stations: HashMap::new(),
            forwarding_enabled: false,
            fail_register: None,
            fail_enable: None,
            fail_set_state: None,
            profile: None,
        }
    }
}

impl FakeForwardingState {
    pub fn station_state(&self, station_id: StationId) -> Option<StationState> {
        self.stations.get(&station_id).map(|(_, state)| *state)
    }

    pub fn station_for(&self, mac: &MacAddr) -> Option<StationId> {
        self.stations.iter().find(|(_, (m, _))| m == mac).map(|(id, _)| *id)
    }

    /// Number of times a station was moved to `Authenticated` after registration.
    pub fn promotions(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(call, ForwardingCall::SetState { state: StationState::Authenticated, .. })
            })
            .count()
    }
}

/// Records every call to the forwarding layer. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct FakeForwarding {
    pub state: Arc<Mutex<FakeForwardingState>>,
}

impl FakeForwarding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: ConnectionProfile) -> Self {
        let fwd = Self::new();
        fwd.state.lock().profile = Some(profile);
        fwd
    }
}

impl ForwardingOps for FakeForwarding {
    fn register_station(
        &mut self,
        session: SessionId,
        params: StationParams,
    ) -> Result<StationId, ForwardingError> {
        let mut state = self.state.lock();
        state.calls.push(ForwardingCall::Register { session, params });
        if let Some(e) = state.fail_register.clone() {
            return Err(e);
        }
        let station_id = state.next_station_id;
        state.next_station_id += 1;
        state.stations.insert(station_id, (params.mac, params.initial_state));
        Ok(station_id)
    }

    fn deregister_station(
        &mut self,
        session: SessionId,
        station_id: StationId,
    ) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.calls.push(ForwardingCall::Deregister { session, station_id });
        state
            .stations
            .remove(&station_id)
            .map(|_| ())
            .ok_or(ForwardingError::UnknownStation(station_id))
    }

    fn set_station_state(
        &mut self,
        session: SessionId,
        station_id: StationId,
        new_state: StationState,
    ) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.calls.push(ForwardingCall::SetState { session, station_id, state: new_state });
        if let Some(e) = state.fail_set_state.clone() {
            return Err(e);
        }
        match state.stations.get_mut(&station_id) {
            Some((_, current)) => {
                *current = new_state;
                Ok(())
            }
            None => Err(ForwardingError::UnknownStation(station_id)),
        }
    }

    fn enable_forwarding(&mut self, session: SessionId) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.calls.push(ForwardingCall::Enable { session });
        if let Some(e) = state.fail_enable.clone() {
            return Err(e);
        }
        state.forwarding_enabled = true;
        Ok(())
    }

    fn disable_forwarding(&mut self, session: SessionId) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.calls.push(ForwardingCall::Disable { session });
        state.forwarding_enabled = false;
        Ok(())
    }
}

impl ProfileSource for FakeForwarding {
    fn get_connection_profile(&self, _session: SessionId) -> Option<ConnectionProfile> {
        self.state.lock().profile.clone()
    }
}

pub fn fake_profile(bssid: MacAddr, auth: AuthType) -> ConnectionProfile {
    let cipher = match auth {
        AuthType::Open => CipherSuite::None,
        AuthType::SharedKey => CipherSuite::Wep104,
        _ => CipherSuite::Ccmp,
    };
    ConnectionProfile {
        bssid,
        ssid: b"foo".to_vec(),
        operating_channel: 6,
        negotiated_auth_type: auth,
        negotiated_unicast_cipher: cipher,
        negotiated_multicast_cipher: cipher,
        roam_offloaded: false,
    }
}

pub fn connect_req() -> ConnectRequest {
    ConnectRequest { ssid: b"foo".to_vec(), bssid: Some(AP_BSSID) }
}

pub fn bss_info(bssid: MacAddr) -> RoamInfo {
    RoamInfo { bssid: Some(bssid), ..Default::default() }
}

pub fn peer_info(peer: MacAddr) -> RoamInfo {
    RoamInfo { peer_addr: Some(peer), ..Default::default() }
}

pub fn association_completion(bssid: MacAddr) -> Event {
    Event::new(EventKind::AssociationCompletion).with_info(RoamInfo {
        resp_ies: vec![0xdd, 0x01, 0x02],
        ..bss_info(bssid)
    })
}

pub fn association_failure(bssid: MacAddr) -> Event {
    Event::new(EventKind::AssociationFailure)
        .with_info(bss_info(bssid))
        .with_status(StatusCode::REFUSED_REASON_UNSPECIFIED)
}

pub fn set_key_complete(bssid: MacAddr, key_type: KeyType) -> Event {
    Event::new(EventKind::SetKeyComplete)
        .with_info(RoamInfo { key_type: Some(key_type), ..bss_info(bssid) })
}

pub fn ibss_event(kind: EventKind, result: ResultCode, info: RoamInfo) -> Event {
    Event::new(kind).with_info(info).with_result(result)
}

pub fn drain_notifications(stream: &mut NotificationStream) -> Vec<Notification> {
    let mut notifications = vec![];
    while let Ok(Some(notification)) = stream.try_next() {
        notifications.push(notification);
    }
    notifications
}

/// A session wired to fakes, with handles on everything it talks to.
pub struct TestHelper {
    pub session: Session<FakeForwarding>,
    pub notifications: NotificationStream,
    pub fwd: FakeForwarding,
    pub scheduler: FakeScheduler,
    pub shared: Arc<SharedContext>,
}

impl TestHelper {
    pub fn new(profile: ConnectionProfile) -> Self {
        Self::with_config(Config::default(), profile)
    }

    pub fn with_config(cfg: Config, profile: ConnectionProfile) -> Self {
        Self::with_shared(cfg, profile, CLIENT_SESSION, Arc::new(SharedContext::new()))
    }

    pub fn with_shared(
        cfg: Config,
        profile: ConnectionProfile,
        id: SessionId,
        shared: Arc<SharedContext>,
    ) -> Self {
        let fwd = FakeForwarding::with_profile(profile);
        let scheduler = FakeScheduler::new();
        let (session, notifications) = Session::new(
            id,
            cfg,
            Arc::clone(&shared),
            fwd.clone(),
            Box::new(scheduler.clone()),
        );
        Self { session, notifications, fwd, scheduler, shared }
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        drain_notifications(&mut self.notifications)
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.fwd.state.lock().forwarding_enabled
    }

    /// Live scheduled events, oldest first.
    pub fn scheduled(&self) -> Vec<EventId> {
        self.scheduler.state.lock().live()
    }

    pub fn last_scheduled(&self) -> EventId {
        *self.scheduled().last().expect("an event to be scheduled")
    }
}
