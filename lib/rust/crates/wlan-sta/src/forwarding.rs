// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::{error::ForwardingError, MacAddr, SessionId, StationId};

/// Port state of a registered station in the data plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StationState {
    /// Associated, but only upper-layer authentication frames may pass.
    Connected,
    /// All data frames may pass.
    Authenticated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StationParams {
    pub mac: MacAddr,
    pub qos_enabled: bool,
    pub initial_state: StationState,
}

/// The data-plane forwarding layer. Every call is synchronous and may fail.
pub trait ForwardingOps {
    fn register_station(
        &mut self,
        session: SessionId,
        params: StationParams,
    ) -> Result<StationId, ForwardingError>;
    fn deregister_station(
        &mut self,
        session: SessionId,
        station_id: StationId,
    ) -> Result<(), ForwardingError>;
    fn set_station_state(
        &mut self,
        session: SessionId,
        station_id: StationId,
        state: StationState,
    ) -> Result<(), ForwardingError>;
    fn enable_forwarding(&mut self, session: SessionId) -> Result<(), ForwardingError>;
    fn disable_forwarding(&mut self, session: SessionId) -> Result<(), ForwardingError>;
}
