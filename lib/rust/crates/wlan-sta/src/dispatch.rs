// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        codes::{ReasonCode, StatusCode},
        error::Error,
        forwarding::ForwardingOps,
        key::KeyType,
        profile::ProfileSource,
        session::Session,
        MacAddr, Ssid,
    },
    log::warn,
};

/// Firmware-originated connection events, by raw firmware code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionOpened,
    AssociationCompletion,
    AssociationFailure,
    Disassociated,
    LostLink,
    IbssIndication,
    ConnectStatusUpdate,
    MicErrorIndication,
    SetKeyComplete,
    FastTransitionStart,
    FastTransitionResponse,
    RoamShouldRoam,
    TdlsStatusUpdate,
    Unknown(u32),
}

impl From<u32> for EventKind {
    fn from(code: u32) -> Self {
        match code {
            0 => EventKind::SessionOpened,
            1 => EventKind::AssociationCompletion,
            2 => EventKind::AssociationFailure,
            3 => EventKind::Disassociated,
            4 => EventKind::LostLink,
            5 => EventKind::IbssIndication,
            6 => EventKind::ConnectStatusUpdate,
            7 => EventKind::MicErrorIndication,
            8 => EventKind::SetKeyComplete,
            9 => EventKind::FastTransitionStart,
            10 => EventKind::FastTransitionResponse,
            11 => EventKind::RoamShouldRoam,
            12 => EventKind::TdlsStatusUpdate,
            other => EventKind::Unknown(other),
        }
    }
}

/// Sub-code qualifying ad-hoc, TDLS and generic outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    Failure,
    IbssStarted,
    IbssJoinSuccess,
    IbssCoalesced,
    IbssStopped,
    IbssJoinFailed,
    IbssNewPeer,
    IbssPeerDeparted,
    TdlsAddRequested,
    TdlsAddComplete,
    TdlsDelete,
}

/// Peer/roam payload of an event. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoamInfo {
    pub bssid: Option<MacAddr>,
    pub peer_addr: Option<MacAddr>,
    pub ssid: Option<Ssid>,
    pub channel: Option<u8>,
    pub key_type: Option<KeyType>,
    pub req_ies: Vec<u8>,
    pub resp_ies: Vec<u8>,
    pub reason_code: Option<ReasonCode>,
    pub qos_enabled: bool,
}

impl RoamInfo {
    pub const fn none() -> Self {
        Self {
            bssid: None,
            peer_addr: None,
            ssid: None,
            channel: None,
            key_type: None,
            req_ies: Vec::new(),
            resp_ies: Vec::new(),
            reason_code: None,
            qos_enabled: false,
        }
    }
}

static NO_INFO: RoamInfo = RoamInfo::none();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub info: Option<RoamInfo>,
    pub status_code: StatusCode,
    pub result_code: ResultCode,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            info: None,
            status_code: StatusCode::SUCCESS,
            result_code: ResultCode::Success,
        }
    }

    pub fn with_info(self, info: RoamInfo) -> Self {
        Self { info: Some(info), ..self }
    }

    pub fn with_status(self, status_code: StatusCode) -> Self {
        Self { status_code, ..self }
    }

    pub fn with_result(self, result_code: ResultCode) -> Self {
        Self { result_code, ..self }
    }
}

/// Hands `event` to the one handler responsible for its kind.
pub fn deliver_event<D: ForwardingOps + ProfileSource>(
    session: &mut Session<D>,
    event: Event,
) -> Result<(), Error> {
    let info = event.info.as_ref().unwrap_or(&NO_INFO);
    let status = event.status_code;
    match event.kind {
        EventKind::SessionOpened => session.on_session_opened(info),
        EventKind::AssociationCompletion => session.on_association_completion(info, status),
        EventKind::AssociationFailure => session.on_association_failure(info, status),
        EventKind::Disassociated => session.on_disassociated(info),
        EventKind::LostLink => session.on_lost_link(info),
        EventKind::IbssIndication => session.on_ibss_indication(info, event.result_code),
        EventKind::ConnectStatusUpdate => session.on_connect_status_update(info, event.result_code),
        EventKind::MicErrorIndication => session.on_mic_error(info),
        EventKind::SetKeyComplete => session.on_set_key_complete(info, status),
        EventKind::FastTransitionStart => session.on_fast_transition_start(info),
        EventKind::FastTransitionResponse => session.on_fast_transition_response(info, status),
        EventKind::RoamShouldRoam => {
            session.on_roam_should_roam(info);
            Ok(())
        }
        EventKind::TdlsStatusUpdate => session.on_tdls_status_update(info, event.result_code),
        EventKind::Unknown(code) => {
            warn!("{}: dropping event with unknown code {}", session.id(), code);
            session.on_unknown_event();
            Ok(())
        }
    }
}
