// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        codes::{ReasonCode, StatusCode},
        format::MacFmt,
        key::KeyType,
        sink::NotificationSink,
        MacAddr, SessionId,
    },
    futures::channel::mpsc,
    log::{info, warn},
};

/// Upward notifications consumed by the network stack and the supplicant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    ConnectResult { bssid: MacAddr, status: StatusCode, ies: Vec<u8> },
    Disconnect { reason_code: ReasonCode },
    Roamed { bssid: MacAddr, request_ies: Vec<u8>, response_ies: Vec<u8> },
    MicFailure { peer_mac: MacAddr, key_type: KeyType },
    IbssJoined { bssid: MacAddr },
    NewStation { mac: MacAddr },
    DelStation { mac: MacAddr },
}

pub type NotificationStream = mpsc::UnboundedReceiver<Notification>;

/// Turns session transitions into notifications, at most one disconnect per disconnect cycle.
#[derive(Debug)]
pub struct NotificationBridge {
    session: SessionId,
    sink: NotificationSink,
    disconnect_reported: bool,
}

impl NotificationBridge {
    pub fn new(session: SessionId) -> (Self, NotificationStream) {
        let (sink, stream) = mpsc::unbounded();
        (
            Self { session, sink: NotificationSink::new(sink), disconnect_reported: false },
            stream,
        )
    }

    /// Opens a new disconnect cycle; the next disconnect will be reported.
    pub fn new_cycle(&mut self) {
        self.disconnect_reported = false;
    }

    pub fn disconnect_reported(&self) -> bool {
        self.disconnect_reported
    }

    pub fn connect_result(&self, bssid: MacAddr, status: StatusCode, ies: Vec<u8>) {
        info!("{}: connect result for {}: {:?}", self.session, bssid.to_mac_str(), status);
        self.sink.send(Notification::ConnectResult { bssid, status, ies });
    }

    /// Reports a disconnect unless one was already reported in this cycle. Returns whether the
    /// notification was sent.
    pub fn disconnect(&mut self, reason_code: ReasonCode) -> bool {
        if self.disconnect_reported {
            warn!("{}: disconnect already reported; dropping {:?}", self.session, reason_code);
            return false;
        }
        self.disconnect_reported = true;
        info!("{}: disconnected, {:?}", self.session, reason_code);
        self.sink.send(Notification::Disconnect { reason_code });
        true
    }

    pub fn roamed(&self, bssid: MacAddr, request_ies: Vec<u8>, response_ies: Vec<u8>) {
        info!("{}: roamed to {}", self.session, bssid.to_mac_str());
        self.sink.send(Notification::Roamed { bssid, request_ies, response_ies });
    }

    pub fn mic_failure(&self, peer_mac: MacAddr, key_type: KeyType) {
        warn!("{}: MIC failure on {:?} key of {}", self.session, key_type, peer_mac.to_mac_str());
        self.sink.send(Notification::MicFailure { peer_mac, key_type });
    }

    pub fn ibss_joined(&self, bssid: MacAddr) {
        info!("{}: joined IBSS {}", self.session, bssid.to_mac_str());
        self.sink.send(Notification::IbssJoined { bssid });
    }

    pub fn new_station(&self, mac: MacAddr) {
        self.sink.send(Notification::NewStation { mac });
    }

    pub fn del_station(&self, mac: MacAddr) {
        self.sink.send(Notification::DelStation { mac });
    }
}
