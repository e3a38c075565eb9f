// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        codes::StatusCode, format::MacFmt, state::ConnectionState, MacAddr, SessionId,
        StationId,
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("peer table full; all {capacity} slots are occupied")]
    PeerTableFull { capacity: usize },
    #[error("forwarding layer failed for peer {}: {source}", mac_str(.mac))]
    Forwarding {
        mac: MacAddr,
        #[source]
        source: ForwardingError,
    },
    #[error("failed to switch forwarding for {session}: {source}")]
    ForwardingSwitch {
        session: SessionId,
        #[source]
        source: ForwardingError,
    },
    #[error("cannot register peer {} in {state:?}", mac_str(.mac))]
    RegistrationRejected { mac: MacAddr, state: ConnectionState },
    #[error("invalid connection state transition {from:?} -> {to:?}")]
    InvalidTransition { from: ConnectionState, to: ConnectionState },
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

fn mac_str(mac: &MacAddr) -> String {
    mac.to_mac_str()
}

/// Failures reported by the data-plane forwarding layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ForwardingError {
    #[error("no resources left for another station")]
    NoResources,
    #[error("unknown station id {0}")]
    UnknownStation(StationId),
    #[error("rejected with status {0}")]
    Rejected(i32),
}

impl From<&Error> for StatusCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::PeerTableFull { .. } => StatusCode::DENIED_NO_MORE_STAS,
            Error::Forwarding { source: ForwardingError::NoResources, .. } => {
                StatusCode::DENIED_NO_MORE_STAS
            }
            Error::Forwarding { .. }
            | Error::ForwardingSwitch { .. }
            | Error::RegistrationRejected { .. }
            | Error::InvalidTransition { .. }
            | Error::Internal(_) => StatusCode::REFUSED_REASON_UNSPECIFIED,
        }
    }
}
