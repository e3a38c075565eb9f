// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::error::Error;

/// Interface-level connection state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Associated,
    /// A disconnect was issued and the firmware has not confirmed its cleanup yet.
    Disconnecting,
    IbssConnected,
    IbssDisconnected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::NotConnected
    }
}

impl ConnectionState {
    /// States in which the data plane forwards frames for the session.
    pub fn is_forwarding(&self) -> bool {
        matches!(self, ConnectionState::Associated | ConnectionState::IbssConnected)
    }

    pub fn is_ad_hoc(&self) -> bool {
        matches!(self, ConnectionState::IbssConnected | ConnectionState::IbssDisconnected)
    }

    /// A local disconnect was requested or has completed, so association outcomes that are
    /// still in flight must not be reported.
    pub fn is_disconnect_requested(&self) -> bool {
        matches!(self, ConnectionState::NotConnected | ConnectionState::Disconnecting)
    }

    pub fn check_transition(self, to: ConnectionState) -> Result<(), Error> {
        use ConnectionState::*;
        let allowed = self == to
            || match (self, to) {
                (NotConnected, Connecting) | (Disconnecting, Connecting) => true,
                (Connecting, Associated) => true,
                (Connecting, NotConnected) | (Connecting, Disconnecting) => true,
                (Associated, Disconnecting) => true,
                (Disconnecting, NotConnected) => true,
                (NotConnected, IbssDisconnected) => true,
                (IbssDisconnected, IbssConnected) | (IbssConnected, IbssDisconnected) => true,
                (IbssDisconnected, NotConnected) | (IbssConnected, NotConnected) => true,
                _ => false,
            };
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: self, to })
        }
    }
}
