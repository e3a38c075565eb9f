// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        codes::{ReasonCode, StatusCode},
        config::Config,
        context::SharedContext,
        dispatch::{ResultCode, RoamInfo},
        error::Error,
        format::{MacFmt, SsidFmt},
        forwarding::{ForwardingOps, StationState},
        key::{self, KeyProgress, KeyType},
        notify::{NotificationBridge, NotificationStream},
        peer::{self, PeerKind, PeerTable},
        profile::{ConnectionProfile, ProfileSource, SecurityProfile},
        roam::{DeferredKeyContext, RoamContext},
        state::ConnectionState::{self, *},
        stats::SessionStats,
        task::Task,
        timer::{EventId, Scheduler, Timer},
        MacAddr, SessionId, Ssid, StationId,
    },
    log::{error, info, warn},
    std::sync::Arc,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub ssid: Ssid,
    pub bssid: Option<MacAddr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BssInfo {
    pub bssid: MacAddr,
    pub ssid: Ssid,
    pub channel: u8,
}

impl From<&ConnectionProfile> for BssInfo {
    fn from(profile: &ConnectionProfile) -> Self {
        Self {
            bssid: profile.bssid,
            ssid: profile.ssid.clone(),
            channel: profile.operating_channel,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub connected_to: Option<BssInfo>,
    pub connecting_to: Option<Ssid>,
}

// Collaborators shared by every handler of a session.
struct Context<D> {
    cfg: Config,
    device: D,
    bridge: NotificationBridge,
    timer: Timer<Task>,
    shared: Arc<SharedContext>,
    stats: SessionStats,
}

/// One logical station interface.
///
/// All events of a session are processed in arrival order on a single context. Follow-up work is
/// handed to the scheduler and comes back through [`Session::on_timeout`].
pub struct Session<D> {
    id: SessionId,
    state: ConnectionState,
    profile: Option<ConnectionProfile>,
    peers: PeerTable,
    roam: RoamContext,
    // An automatically increasing sequence number identifying the current connection attempt.
    connection_id: u64,
    counted_active: bool,
    connecting_to: Option<ConnectRequest>,
    ibss_joined: Option<MacAddr>,
    cleanup_timeout: Option<EventId>,
    ctx: Context<D>,
}

impl<D: ForwardingOps + ProfileSource> Session<D> {
    pub fn new(
        id: SessionId,
        cfg: Config,
        shared: Arc<SharedContext>,
        device: D,
        scheduler: Box<dyn Scheduler>,
    ) -> (Self, NotificationStream) {
        let (bridge, notification_stream) = NotificationBridge::new(id);
        (
            Session {
                id,
                state: NotConnected,
                profile: None,
                peers: PeerTable::new(cfg.peer_table_capacity),
                roam: RoamContext::new(),
                connection_id: 0,
                counted_active: false,
                connecting_to: None,
                ibss_joined: None,
                cleanup_timeout: None,
                ctx: Context {
                    cfg,
                    device,
                    bridge,
                    timer: Timer::new(id, scheduler),
                    shared,
                    stats: SessionStats::default(),
                },
            },
            notification_stream,
        )
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn profile(&self) -> Option<&ConnectionProfile> {
        self.profile.as_ref()
    }

    pub fn peer_table(&self) -> &PeerTable {
        &self.peers
    }

    pub fn deferred_key_context(&self) -> Option<&DeferredKeyContext> {
        self.roam.deferred()
    }

    pub fn fast_transition_active(&self) -> bool {
        self.roam.is_active()
    }

    pub fn roam_id(&self) -> u64 {
        self.roam.roam_id()
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn stats(&self) -> &SessionStats {
        &self.ctx.stats
    }

    pub fn status(&self) -> Status {
        match self.state {
            Connecting => Status {
                connected_to: None,
                connecting_to: self.connecting_to.as_ref().map(|req| req.ssid.clone()),
            },
            Associated | IbssConnected => Status {
                connected_to: self.profile.as_ref().map(BssInfo::from),
                connecting_to: None,
            },
            NotConnected | Disconnecting | IbssDisconnected => Status::default(),
        }
    }

    /// Starts a new connection attempt. Only valid once the previous one was torn down.
    pub fn connect(&mut self, req: ConnectRequest) -> Result<(), Error> {
        if !self.state.is_disconnect_requested() {
            return Err(Error::InvalidTransition { from: self.state, to: Connecting });
        }
        self.cancel_cleanup_timeout();
        self.connection_id += 1;
        self.ctx.bridge.new_cycle();
        self.profile = None;
        self.ibss_joined = None;
        info!(
            "{}: connecting to {:?} (connection {})",
            self.id,
            req.ssid.to_ssid_str(),
            self.connection_id
        );
        self.connecting_to = Some(req);
        self.transition_to(Connecting)
    }

    /// Local disconnect request. Association outcomes still in flight will not be reported.
    pub fn disconnect(&mut self, reason_code: ReasonCode) -> Result<(), Error> {
        match self.state {
            NotConnected | Disconnecting => {
                info!("{}: disconnect requested in {:?}; nothing to do", self.id, self.state);
                Ok(())
            }
            Connecting => {
                self.connecting_to = None;
                self.transition_to(Disconnecting)?;
                self.ctx.bridge.disconnect(reason_code);
                self.schedule_cleanup_timeout();
                Ok(())
            }
            Associated => self.tear_down_link(reason_code),
            IbssConnected | IbssDisconnected => self.leave_ibss(reason_code),
        }
    }

    /// Firmware finished cleaning up after a disconnect.
    pub fn on_cleanup_complete(&mut self) -> Result<(), Error> {
        if self.state == Disconnecting {
            self.finish_cleanup()
        } else {
            info!("{}: cleanup complete in {:?}; ignoring", self.id, self.state);
            Ok(())
        }
    }

    pub fn stop_ibss(&mut self) -> Result<(), Error> {
        if self.state.is_ad_hoc() {
            self.leave_ibss(ReasonCode::LEAVING_NETWORK_DEAUTH)
        } else {
            self.absorb_unexpected("IBSS stop");
            Ok(())
        }
    }

    /// Registers a peer for the current mode: the AP while connecting or associated, a neighbor
    /// while ad-hoc. An associated session keeps its AP; registering a different one fails.
    pub fn register_peer(
        &mut self,
        mac: MacAddr,
        security: SecurityProfile,
        qos_enabled: bool,
    ) -> Result<StationId, Error> {
        let kind = match self.state {
            IbssConnected | IbssDisconnected => PeerKind::AdHoc,
            Connecting => PeerKind::AccessPoint,
            Associated if self.peers.primary().map_or(true, |ap| ap.mac == mac) => {
                PeerKind::AccessPoint
            }
            Associated | NotConnected | Disconnecting => {
                warn!("{}: refusing to register {} in {:?}", self.id, mac.to_mac_str(), self.state);
                return Err(Error::RegistrationRejected { mac, state: self.state });
            }
        };
        peer::register_peer(
            &mut self.peers,
            &mut self.ctx.device,
            self.id,
            mac,
            kind,
            security,
            qos_enabled,
        )
    }

    pub fn deregister_peer(&mut self, station_id: StationId) {
        let removed =
            peer::deregister_peer(&mut self.peers, &mut self.ctx.device, self.id, station_id);
        if removed.is_none() {
            self.ctx.stats.double_deregistrations += 1;
            info!("{}: station {} already deregistered", self.id, station_id);
        }
    }

    /// Removes an ad-hoc neighbor. Returns false if the station was not registered.
    pub fn remove_ad_hoc_peer(&mut self, station_id: StationId) -> bool {
        if !self.state.is_ad_hoc() {
            self.absorb_unexpected("ad-hoc peer removal");
            return false;
        }
        let removed =
            peer::deregister_peer(&mut self.peers, &mut self.ctx.device, self.id, station_id);
        let entry = match removed {
            Some(entry) => entry,
            None => {
                self.ctx.stats.double_deregistrations += 1;
                warn!("{}: ad-hoc station {} already removed", self.id, station_id);
                return false;
            }
        };
        if let Some(from) = self.peers.rehome_primary() {
            info!("{}: moved ad-hoc peer in slot {} to the primary slot", self.id, from);
        }
        self.ctx.bridge.del_station(entry.mac);
        if self.peers.is_empty() && self.state == IbssConnected {
            if let Err(e) = self.transition_to(IbssDisconnected) {
                error!("{}: failed to leave connected IBSS: {}", self.id, e);
            }
        }
        true
    }

    pub fn on_timeout(&mut self, event_id: EventId) -> Result<(), Error> {
        let task = match self.ctx.timer.triggered(&event_id) {
            Some(task) => task,
            None => return Ok(()),
        };
        match task {
            Task::DisconnectCleanupTimeout { connection_id } => {
                if self.cleanup_timeout == Some(event_id) {
                    self.cleanup_timeout = None;
                }
                if connection_id != self.connection_id || self.state != Disconnecting {
                    return self.drop_stale_task(task);
                }
                warn!("{}: firmware never confirmed disconnect cleanup; forcing it", self.id);
                self.transition_to(NotConnected)
            }
            Task::FastTransitionTimeout { roam_id } => {
                if !self.roam.is_active() || self.roam.roam_id() != roam_id {
                    return self.drop_stale_task(task);
                }
                self.roam.take_timeout();
                warn!("{}: no response to fast transition {}; giving up", self.id, roam_id);
                self.tear_down_link(ReasonCode::TIMEOUT)
            }
            Task::CheckConcurrentChannel { connection_id } => {
                let channel = match &self.profile {
                    Some(profile)
                        if self.state == Associated && connection_id == self.connection_id =>
                    {
                        profile.operating_channel
                    }
                    _ => return self.drop_stale_task(task),
                };
                let others = self.ctx.shared.sessions_off_channel(self.id, channel);
                if !others.is_empty() {
                    warn!(
                        "{}: multi-channel concurrency; on channel {} while others use {:?}",
                        self.id, channel, others
                    );
                }
                Ok(())
            }
        }
    }

    pub(crate) fn on_session_opened(&mut self, info: &RoamInfo) -> Result<(), Error> {
        info!(
            "{}: firmware session opened in {:?} ({})",
            self.id,
            self.state,
            info.bssid.map_or_else(|| "no bssid".to_string(), |bssid| bssid.to_mac_str())
        );
        Ok(())
    }

    pub(crate) fn on_association_completion(
        &mut self,
        info: &RoamInfo,
        status: StatusCode,
    ) -> Result<(), Error> {
        if !status.is_success() {
            return self.on_association_failure(info, status);
        }
        match self.state {
            Connecting => self.complete_association(info),
            NotConnected | Disconnecting => self.absorb_association_outcome(info),
            Associated => {
                self.absorb_duplicate("association completion");
                Ok(())
            }
            IbssConnected | IbssDisconnected => {
                self.absorb_unexpected("association completion");
                Ok(())
            }
        }
    }

    pub(crate) fn on_association_failure(
        &mut self,
        info: &RoamInfo,
        status: StatusCode,
    ) -> Result<(), Error> {
        match self.state {
            Connecting => {
                let status = match status {
                    StatusCode::SUCCESS => StatusCode::REFUSED_REASON_UNSPECIFIED,
                    status => status,
                };
                let bssid = self.attempted_bssid(info);
                warn!("{}: association with {} failed: {:?}", self.id, bssid.to_mac_str(), status);
                self.ctx.bridge.connect_result(bssid, status, info.resp_ies.clone());
                self.connecting_to = None;
                self.transition_to(NotConnected)
            }
            NotConnected | Disconnecting => self.absorb_association_outcome(info),
            Associated | IbssConnected | IbssDisconnected => {
                self.absorb_unexpected("association failure");
                Ok(())
            }
        }
    }

    pub(crate) fn on_disassociated(&mut self, info: &RoamInfo) -> Result<(), Error> {
        if self.state == Associated && self.roam.is_active() {
            let old_bssid = self.profile.as_ref().map(|p| p.bssid);
            if info.bssid.is_none() || info.bssid == old_bssid {
                self.ctx.stats.roam_disassociations_absorbed += 1;
                info!("{}: disassociation from the previous BSS during fast transition", self.id);
                return Ok(());
            }
        }
        self.on_link_down(info, ReasonCode::LEAVING_NETWORK_DISASSOC)
    }

    pub(crate) fn on_lost_link(&mut self, info: &RoamInfo) -> Result<(), Error> {
        self.on_link_down(info, ReasonCode::REASON_INACTIVITY)
    }

    pub(crate) fn on_ibss_indication(
        &mut self,
        info: &RoamInfo,
        result: ResultCode,
    ) -> Result<(), Error> {
        match result {
            ResultCode::IbssStarted => self.start_ibss(info),
            ResultCode::IbssJoinSuccess | ResultCode::IbssCoalesced => {
                self.join_ibss(info);
                Ok(())
            }
            ResultCode::IbssStopped => self.stop_ibss(),
            ResultCode::IbssJoinFailed if self.state.is_ad_hoc() => {
                warn!("{}: failed to join IBSS", self.id);
                self.leave_ibss(ReasonCode::UNSPECIFIED_REASON)
            }
            other => {
                self.absorb_unexpected(&format!("IBSS indication {:?}", other));
                Ok(())
            }
        }
    }

    pub(crate) fn on_connect_status_update(
        &mut self,
        info: &RoamInfo,
        result: ResultCode,
    ) -> Result<(), Error> {
        match result {
            ResultCode::IbssNewPeer => self.add_ad_hoc_peer(info),
            ResultCode::IbssPeerDeparted => {
                let station_id = info
                    .peer_addr
                    .and_then(|mac| self.peers.find_by_mac(&mac))
                    .and_then(|slot| self.peers.get(slot))
                    .map(|entry| entry.station_id);
                match station_id {
                    Some(station_id) => {
                        self.remove_ad_hoc_peer(station_id);
                    }
                    None => {
                        self.ctx.stats.double_deregistrations += 1;
                        warn!("{}: departed ad-hoc peer is not registered", self.id);
                    }
                }
                Ok(())
            }
            other => {
                info!("{}: ignoring connect status update {:?}", self.id, other);
                Ok(())
            }
        }
    }

    pub(crate) fn on_mic_error(&mut self, info: &RoamInfo) -> Result<(), Error> {
        if !self.state.is_forwarding() {
            self.absorb_unexpected("MIC failure");
            return Ok(());
        }
        let peer_mac = info
            .peer_addr
            .or(info.bssid)
            .or_else(|| self.profile.as_ref().map(|p| p.bssid))
            .unwrap_or_default();
        self.ctx.stats.mic_failures += 1;
        self.ctx.bridge.mic_failure(peer_mac, info.key_type.unwrap_or(KeyType::Pairwise));
        Ok(())
    }

    pub(crate) fn on_set_key_complete(
        &mut self,
        info: &RoamInfo,
        status: StatusCode,
    ) -> Result<(), Error> {
        let (key_type, peer_mac) = match (info.key_type, info.peer_addr.or(info.bssid)) {
            (Some(key_type), Some(peer_mac)) => (key_type, peer_mac),
            _ => {
                self.absorb_unexpected("key completion without key type or peer");
                return Ok(());
            }
        };
        if !status.is_success() {
            self.ctx.stats.failed_key_completions += 1;
            warn!(
                "{}: installing {:?} key for {} failed: {:?}",
                self.id,
                key_type,
                peer_mac.to_mac_str(),
                status
            );
            return Ok(());
        }
        let slot = self.peers.find_by_mac(&peer_mac);
        if slot.is_none() && self.roam.is_active() {
            let bssid = info.bssid.unwrap_or(peer_mac);
            if self.roam.defer(self.id, bssid, peer_mac, key_type, status).is_some() {
                self.ctx.stats.stale_deferred_keys += 1;
            }
            info!(
                "{}: deferring {:?} key completion for {} until roam {} completes",
                self.id,
                key_type,
                peer_mac.to_mac_str(),
                self.roam.roam_id()
            );
            return Ok(());
        }
        match slot {
            Some(slot) => self.apply_key(slot, key_type),
            None => {
                self.record_orphan_key(peer_mac, key_type);
                Ok(())
            }
        }
    }

    pub(crate) fn on_fast_transition_start(&mut self, _info: &RoamInfo) -> Result<(), Error> {
        if self.state != Associated {
            self.absorb_unexpected("fast transition start");
            return Ok(());
        }
        let strategy = self.roam.strategy();
        if !strategy.uses_fast_transition {
            self.absorb_unexpected(&format!("fast transition start for {:?}", strategy.variant));
            return Ok(());
        }
        if self.roam.is_active() {
            self.absorb_duplicate("fast transition start");
            return Ok(());
        }
        let roam_id = self.roam.begin();
        if let Some(ap) = self.peers.primary().map(|entry| entry.station_id) {
            peer::deregister_peer(&mut self.peers, &mut self.ctx.device, self.id, ap);
        }
        let event_id = self.schedule(Task::FastTransitionTimeout { roam_id });
        self.roam.set_timeout(event_id);
        info!("{}: fast transition {} started ({:?})", self.id, roam_id, strategy.variant);
        Ok(())
    }

    pub(crate) fn on_fast_transition_response(
        &mut self,
        info: &RoamInfo,
        status: StatusCode,
    ) -> Result<(), Error> {
        if self.state != Associated || !self.roam.is_active() {
            self.absorb_unexpected("fast transition response");
            return Ok(());
        }
        if let Some(event_id) = self.roam.take_timeout() {
            self.ctx.timer.cancel_event(event_id);
        }
        if !status.is_success() {
            warn!("{}: fast transition {} failed: {:?}", self.id, self.roam.roam_id(), status);
            return self.tear_down_link(info.reason_code.unwrap_or(ReasonCode::UNSPECIFIED_REASON));
        }
        let profile = match self.roamed_profile(info) {
            Some(profile) => profile,
            None => {
                self.tear_down_link(ReasonCode::UNSPECIFIED_REASON)?;
                return Err(Error::Internal(anyhow::format_err!(
                    "no profile for the BSS joined by fast transition"
                )));
            }
        };
        let bssid = profile.bssid;
        if let Err(e) = peer::register_peer(
            &mut self.peers,
            &mut self.ctx.device,
            self.id,
            bssid,
            PeerKind::AccessPoint,
            profile.security_profile(),
            info.qos_enabled,
        ) {
            self.tear_down_link(ReasonCode::UNSPECIFIED_REASON)?;
            return Err(e);
        }
        self.ctx.shared.update_operating_channel(self.id, profile.operating_channel);
        self.profile = Some(profile);

        let deferred = self.roam.take_deferred(self.id);
        self.roam.complete();
        self.ctx.stats.roams_completed += 1;
        let replayed = match deferred {
            Some(deferred) => self.replay_deferred_key(deferred),
            None => Ok(()),
        };
        self.ctx.bridge.roamed(bssid, info.req_ies.clone(), info.resp_ies.clone());
        replayed
    }

    /// Pre-roam notice from firmware. Returns whether roaming is permitted.
    pub(crate) fn on_roam_should_roam(&mut self, _info: &RoamInfo) -> bool {
        let strategy = self.roam.strategy();
        let permitted =
            self.state == Associated && !self.roam.is_active() && strategy.supports_roaming;
        if permitted {
            self.ctx.stats.roams_permitted += 1;
        } else {
            self.ctx.stats.roams_denied += 1;
        }
        info!(
            "{}: roam {} in {:?} ({:?}, fast transition active: {})",
            self.id,
            if permitted { "permitted" } else { "denied" },
            self.state,
            strategy.variant,
            self.roam.is_active()
        );
        permitted
    }

    pub(crate) fn on_tdls_status_update(
        &mut self,
        info: &RoamInfo,
        result: ResultCode,
    ) -> Result<(), Error> {
        if !self.ctx.cfg.tdls_supported {
            self.absorb_unexpected("TDLS update with TDLS disabled");
            return Ok(());
        }
        let mac = match info.peer_addr {
            Some(mac) if self.state == Associated => mac,
            _ => {
                self.absorb_unexpected("TDLS update");
                return Ok(());
            }
        };
        match result {
            ResultCode::TdlsAddRequested => {
                if !self.ctx.shared.begin_tdls_add(self.id, mac) {
                    self.ctx.stats.unexpected_events += 1;
                }
                Ok(())
            }
            ResultCode::TdlsAddComplete => {
                if !self.ctx.shared.finish_tdls_add(self.id, mac) {
                    warn!("{}: TDLS peer {} added without a request", self.id, mac.to_mac_str());
                }
                if self.peers.find_by_mac(&mac).is_some() {
                    self.absorb_duplicate("TDLS add");
                    return Ok(());
                }
                let security =
                    self.profile.as_ref().map_or(SecurityProfile::Open, |p| p.security_profile());
                peer::register_peer(
                    &mut self.peers,
                    &mut self.ctx.device,
                    self.id,
                    mac,
                    PeerKind::Tdls,
                    security,
                    info.qos_enabled,
                )
                .map(|_| ())
            }
            ResultCode::TdlsDelete => {
                self.ctx.shared.finish_tdls_add(self.id, mac);
                let station_id = self
                    .peers
                    .find_by_mac(&mac)
                    .and_then(|slot| self.peers.get(slot))
                    .filter(|entry| entry.kind == PeerKind::Tdls)
                    .map(|entry| entry.station_id);
                match station_id {
                    Some(station_id) => self.deregister_peer(station_id),
                    None => {
                        self.ctx.stats.double_deregistrations += 1;
                        info!("{}: TDLS peer {} not registered", self.id, mac.to_mac_str());
                    }
                }
                Ok(())
            }
            other => {
                self.absorb_unexpected(&format!("TDLS update {:?}", other));
                Ok(())
            }
        }
    }

    pub(crate) fn on_unknown_event(&mut self) {
        self.ctx.stats.unknown_events += 1;
    }

    fn transition_to(&mut self, to: ConnectionState) -> Result<(), Error> {
        let from = self.state;
        if from == to {
            return Ok(());
        }
        from.check_transition(to)?;
        if to.is_forwarding() && !from.is_forwarding() {
            let id = self.id;
            self.ctx
                .device
                .enable_forwarding(id)
                .map_err(|source| Error::ForwardingSwitch { session: id, source })?;
        } else if from.is_forwarding() && !to.is_forwarding() {
            if let Err(e) = self.ctx.device.disable_forwarding(self.id) {
                error!("{}: failed to disable forwarding: {}", self.id, e);
            }
        }
        if to == NotConnected {
            self.cancel_pending_tasks();
        }
        info!("{}: {:?} -> {:?}", self.id, from, to);
        self.state = to;
        Ok(())
    }

    fn complete_association(&mut self, info: &RoamInfo) -> Result<(), Error> {
        let bssid = self.attempted_bssid(info);
        let profile = match self
            .ctx
            .device
            .get_connection_profile(self.id)
            .or_else(|| ConnectionProfile::from_info(info))
        {
            Some(profile) => profile,
            None => {
                let e = anyhow::format_err!("no connection profile for completed association");
                return self.fail_connect(bssid, Error::Internal(e));
            }
        };
        let bssid = profile.bssid;
        if let Err(e) = peer::register_peer(
            &mut self.peers,
            &mut self.ctx.device,
            self.id,
            bssid,
            PeerKind::AccessPoint,
            profile.security_profile(),
            info.qos_enabled,
        ) {
            return self.fail_connect(bssid, e);
        }
        if let Err(e) = self.transition_to(Associated) {
            peer::deregister_all(&mut self.peers, &mut self.ctx.device, self.id);
            return self.fail_connect(bssid, e);
        }
        self.roam.reset(profile.roam_variant());
        let active = self.ctx.shared.connection_started(self.id, profile.operating_channel);
        self.counted_active = true;
        info!(
            "{}: associated with {} on channel {} ({:?} roaming); {} active session(s)",
            self.id,
            bssid.to_mac_str(),
            profile.operating_channel,
            self.roam.strategy().variant,
            active
        );
        self.profile = Some(profile);
        self.connecting_to = None;
        self.ctx.bridge.connect_result(bssid, StatusCode::SUCCESS, info.resp_ies.clone());
        self.schedule(Task::CheckConcurrentChannel { connection_id: self.connection_id });
        Ok(())
    }

    fn fail_connect(&mut self, bssid: MacAddr, e: Error) -> Result<(), Error> {
        error!("{}: failed to complete association with {}: {}", self.id, bssid.to_mac_str(), e);
        self.ctx.bridge.connect_result(bssid, StatusCode::from(&e), vec![]);
        self.connecting_to = None;
        self.transition_to(NotConnected)?;
        Err(e)
    }

    // Bookkeeping for an association outcome that raced a local disconnect. Nothing is reported.
    fn absorb_association_outcome(&mut self, info: &RoamInfo) -> Result<(), Error> {
        self.ctx.stats.suppressed_connect_results += 1;
        warn!(
            "{}: association outcome for {} arrived in {:?}; not reporting it",
            self.id,
            self.attempted_bssid(info).to_mac_str(),
            self.state
        );
        let station_id = info
            .bssid
            .and_then(|bssid| self.peers.find_by_mac(&bssid))
            .and_then(|slot| self.peers.get(slot))
            .map(|entry| entry.station_id);
        if let Some(station_id) = station_id {
            peer::deregister_peer(&mut self.peers, &mut self.ctx.device, self.id, station_id);
        }
        if self.state == Disconnecting {
            self.finish_cleanup()?;
        }
        Ok(())
    }

    fn on_link_down(&mut self, info: &RoamInfo, default_reason: ReasonCode) -> Result<(), Error> {
        let reason_code = info.reason_code.unwrap_or(default_reason);
        match self.state {
            Associated => self.tear_down_link(reason_code),
            Disconnecting => self.finish_cleanup(),
            Connecting => {
                let bssid = self.attempted_bssid(info);
                warn!("{}: link to {} lost before association", self.id, bssid.to_mac_str());
                self.ctx.bridge.connect_result(
                    bssid,
                    StatusCode::REFUSED_REASON_UNSPECIFIED,
                    vec![],
                );
                self.connecting_to = None;
                self.transition_to(NotConnected)
            }
            NotConnected => {
                self.absorb_duplicate("link down");
                Ok(())
            }
            IbssConnected | IbssDisconnected => {
                self.absorb_unexpected("link down");
                Ok(())
            }
        }
    }

    // Ends an infrastructure connection: every peer leaves the data plane and a single
    // disconnect is reported for the cycle.
    fn tear_down_link(&mut self, reason_code: ReasonCode) -> Result<(), Error> {
        if self.roam.is_active() {
            if let Some(event_id) = self.roam.take_timeout() {
                self.ctx.timer.cancel_event(event_id);
            }
            self.roam.abandon();
            self.ctx.stats.roams_abandoned += 1;
            warn!("{}: abandoned fast transition {}", self.id, self.roam.roam_id());
        }
        peer::deregister_all(&mut self.peers, &mut self.ctx.device, self.id);
        self.transition_to(Disconnecting)?;
        self.end_active_connection();
        self.ctx.bridge.disconnect(reason_code);
        self.schedule_cleanup_timeout();
        Ok(())
    }

    fn finish_cleanup(&mut self) -> Result<(), Error> {
        self.cancel_cleanup_timeout();
        self.transition_to(NotConnected)
    }

    fn end_active_connection(&mut self) {
        if std::mem::take(&mut self.counted_active) {
            let active = self.ctx.shared.connection_ended(self.id);
            info!("{}: connection {} ended; {} active", self.id, self.connection_id, active);
        }
    }

    fn start_ibss(&mut self, info: &RoamInfo) -> Result<(), Error> {
        if self.state.is_ad_hoc() {
            self.absorb_duplicate("IBSS start");
            return Ok(());
        }
        if self.state != NotConnected {
            self.absorb_unexpected("IBSS start");
            return Ok(());
        }
        self.connection_id += 1;
        self.ctx.bridge.new_cycle();
        self.profile = ConnectionProfile::from_info(info);
        self.ibss_joined = None;
        self.transition_to(IbssDisconnected)
    }

    fn join_ibss(&mut self, info: &RoamInfo) {
        let bssid = match info.bssid {
            Some(bssid) if self.state.is_ad_hoc() => bssid,
            _ => return self.absorb_unexpected("IBSS join"),
        };
        if self.ibss_joined == Some(bssid) {
            return self.absorb_duplicate("IBSS join");
        }
        self.ibss_joined = Some(bssid);
        match self.profile.as_mut() {
            Some(profile) => profile.bssid = bssid,
            None => self.profile = ConnectionProfile::from_info(info),
        }
        self.ctx.bridge.ibss_joined(bssid);
    }

    fn add_ad_hoc_peer(&mut self, info: &RoamInfo) -> Result<(), Error> {
        let mac = match info.peer_addr {
            Some(mac) if self.state.is_ad_hoc() => mac,
            _ => {
                self.absorb_unexpected("new ad-hoc peer");
                return Ok(());
            }
        };
        if self.peers.find_by_mac(&mac).is_some() {
            self.absorb_duplicate("new ad-hoc peer");
            return Ok(());
        }
        let security =
            self.profile.as_ref().map_or(SecurityProfile::Open, |p| p.security_profile());
        let station_id = peer::register_peer(
            &mut self.peers,
            &mut self.ctx.device,
            self.id,
            mac,
            PeerKind::AdHoc,
            security,
            info.qos_enabled,
        )?;
        if let Err(e) = self.transition_to(IbssConnected) {
            peer::deregister_peer(&mut self.peers, &mut self.ctx.device, self.id, station_id);
            return Err(e);
        }
        self.ctx.bridge.new_station(mac);
        Ok(())
    }

    fn leave_ibss(&mut self, reason_code: ReasonCode) -> Result<(), Error> {
        peer::deregister_all(&mut self.peers, &mut self.ctx.device, self.id);
        self.ibss_joined = None;
        self.profile = None;
        self.transition_to(NotConnected)?;
        self.ctx.bridge.disconnect(reason_code);
        Ok(())
    }

    fn apply_key(&mut self, slot: usize, key_type: KeyType) -> Result<(), Error> {
        let group_key_suffices = self.roam.group_key_suffices();
        let entry = match self.peers.get_mut(slot) {
            Some(entry) => entry,
            None => return Ok(()),
        };
        let (station_id, mac) = (entry.station_id, entry.mac);
        match key::record_key_installed(entry, key_type, group_key_suffices) {
            KeyProgress::Pending => Ok(()),
            KeyProgress::Complete => {
                info!("{}: re-key of {} complete", self.id, mac.to_mac_str());
                Ok(())
            }
            KeyProgress::Promote => {
                self.ctx
                    .device
                    .set_station_state(self.id, station_id, StationState::Authenticated)
                    .map_err(|source| Error::Forwarding { mac, source })?;
                if let Some(entry) = self.peers.get_mut(slot) {
                    entry.authenticated = true;
                }
                self.roam.keys_settled();
                info!("{}: peer {} authenticated", self.id, mac.to_mac_str());
                Ok(())
            }
        }
    }

    fn replay_deferred_key(&mut self, deferred: DeferredKeyContext) -> Result<(), Error> {
        let key_types = deferred.key_types();
        match self.peers.find_by_mac(&deferred.peer_mac) {
            Some(slot) => {
                info!(
                    "{}: replaying deferred {:?} key completion(s) of roam {}",
                    self.id, key_types, deferred.roam_id
                );
                key_types.into_iter().try_for_each(|key_type| self.apply_key(slot, key_type))
            }
            None => {
                for key_type in key_types {
                    self.record_orphan_key(deferred.peer_mac, key_type);
                }
                Ok(())
            }
        }
    }

    fn record_orphan_key(&mut self, peer_mac: MacAddr, key_type: KeyType) {
        if self.ctx.stats.record_orphan_key(self.ctx.cfg.orphan_key_alarm_threshold) {
            error!(
                "{}: {} key completions without a matching peer; latest {:?} for {}",
                self.id,
                self.ctx.stats.orphan_key_completions,
                key_type,
                peer_mac.to_mac_str()
            );
        } else {
            warn!(
                "{}: {:?} key completion for unknown peer {}",
                self.id,
                key_type,
                peer_mac.to_mac_str()
            );
        }
    }

    fn roamed_profile(&self, info: &RoamInfo) -> Option<ConnectionProfile> {
        let reported = self
            .ctx
            .device
            .get_connection_profile(self.id)
            .filter(|profile| info.bssid.map_or(true, |bssid| bssid == profile.bssid));
        reported.or_else(|| {
            self.profile.clone().map(|previous| ConnectionProfile {
                bssid: info.bssid.unwrap_or(previous.bssid),
                operating_channel: info.channel.unwrap_or(previous.operating_channel),
                ..previous
            })
        })
    }

    fn attempted_bssid(&self, info: &RoamInfo) -> MacAddr {
        info.bssid
            .or_else(|| self.connecting_to.as_ref().and_then(|req| req.bssid))
            .unwrap_or_default()
    }

    fn schedule(&mut self, task: Task) -> EventId {
        let delay = task.delay(&self.ctx.cfg);
        self.ctx.timer.schedule_event(delay, task)
    }

    fn schedule_cleanup_timeout(&mut self) {
        self.cancel_cleanup_timeout();
        let event_id =
            self.schedule(Task::DisconnectCleanupTimeout { connection_id: self.connection_id });
        self.cleanup_timeout = Some(event_id);
    }

    fn cancel_cleanup_timeout(&mut self) {
        if let Some(event_id) = self.cleanup_timeout.take() {
            self.ctx.timer.cancel_event(event_id);
        }
    }

    // Nothing scheduled outlives a session that is fully disconnected.
    fn cancel_pending_tasks(&mut self) {
        if self.ctx.timer.pending() > 0 {
            info!("{}: canceling {} pending task(s)", self.id, self.ctx.timer.pending());
        }
        self.ctx.timer.cancel_all();
        self.cleanup_timeout = None;
        self.roam.take_timeout();
    }

    fn drop_stale_task(&mut self, task: Task) -> Result<(), Error> {
        self.ctx.stats.stale_tasks += 1;
        info!("{}: dropping stale {:?}", self.id, task);
        Ok(())
    }

    fn absorb_duplicate(&mut self, what: &str) {
        self.ctx.stats.duplicate_events += 1;
        warn!("{}: duplicate {} in {:?}; ignoring", self.id, what, self.state);
    }

    fn absorb_unexpected(&mut self, what: &str) {
        self.ctx.stats.unexpected_events += 1;
        warn!("{}: unexpected {} in {:?}; ignoring", self.id, what, self.state);
    }
}
