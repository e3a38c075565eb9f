// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Control-plane core of a WLAN station interface.
//!
//! Firmware-originated connection events enter through [`dispatch::deliver_event`] and are
//! reconciled against the per-interface [`session::Session`]: its connection state, its bounded
//! peer table, key installation progress and the single-slot fast-transition context. Peers are
//! registered with the data plane through [`forwarding::ForwardingOps`] and the outcome is
//! reported upward as de-duplicated [`notify::Notification`]s.

pub mod codes;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod forwarding;
pub mod key;
pub mod notify;
pub mod peer;
pub mod profile;
pub mod roam;
pub mod session;
mod sink;
pub mod state;
pub mod stats;
pub mod task;
pub mod timer;

#[cfg(test)]
pub mod test_utils;

pub use crate::{
    config::Config,
    context::SharedContext,
    dispatch::deliver_event,
    error::Error,
    session::Session,
};

pub type MacAddr = [u8; 6];
pub type Ssid = Vec<u8>;

/// Opaque handle handed out by the forwarding layer when a station is registered.
pub type StationId = u32;

/// Marks a peer slot that holds no forwarding-layer registration.
pub const UNREGISTERED_STATION: StationId = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sta{}", self.0)
    }
}
