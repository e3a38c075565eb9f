// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::{dispatch::RoamInfo, roam::RoamVariant, MacAddr, SessionId, Ssid};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthType {
    Open,
    SharedKey,
    WpaPsk,
    Wpa,
    Wpa2Psk,
    Wpa2,
    Wpa3Sae,
    FtPsk,
    Ft8021x,
    FtSae,
    Cckm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherSuite {
    None,
    Wep40,
    Wep104,
    Tkip,
    Ccmp,
    Gcmp,
}

impl CipherSuite {
    pub fn is_wep(&self) -> bool {
        matches!(self, CipherSuite::Wep40 | CipherSuite::Wep104)
    }
}

/// How much of the handshake is left after association.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityProfile {
    Open,
    /// Pre-shared WEP keys; nothing is negotiated after association.
    StaticWep,
    /// An upper-layer handshake (4-way, 802.1X, FT, CCKM) must finish before data flows.
    Rsna,
}

impl SecurityProfile {
    pub fn requires_upper_layer_auth(&self) -> bool {
        *self == SecurityProfile::Rsna
    }
}

/// Snapshot of what was negotiated with the current BSS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub bssid: MacAddr,
    pub ssid: Ssid,
    pub operating_channel: u8,
    pub negotiated_auth_type: AuthType,
    pub negotiated_unicast_cipher: CipherSuite,
    pub negotiated_multicast_cipher: CipherSuite,
    /// Firmware performs reassociation on its own.
    pub roam_offloaded: bool,
}

impl ConnectionProfile {
    /// Minimal open profile built from event payload when firmware has none to offer.
    pub fn from_info(info: &RoamInfo) -> Option<Self> {
        Some(Self {
            bssid: info.bssid?,
            ssid: info.ssid.clone().unwrap_or_default(),
            operating_channel: info.channel.unwrap_or(0),
            negotiated_auth_type: AuthType::Open,
            negotiated_unicast_cipher: CipherSuite::None,
            negotiated_multicast_cipher: CipherSuite::None,
            roam_offloaded: false,
        })
    }

    pub fn security_profile(&self) -> SecurityProfile {
        match self.negotiated_auth_type {
            AuthType::SharedKey => SecurityProfile::StaticWep,
            AuthType::Open
                if self.negotiated_unicast_cipher.is_wep()
                    || self.negotiated_multicast_cipher.is_wep() =>
            {
                SecurityProfile::StaticWep
            }
            AuthType::Open => SecurityProfile::Open,
            _ => SecurityProfile::Rsna,
        }
    }

    pub fn roam_variant(&self) -> RoamVariant {
        if self.roam_offloaded {
            return RoamVariant::OffloadedRoam;
        }
        match self.negotiated_auth_type {
            AuthType::FtPsk | AuthType::Ft8021x | AuthType::FtSae => RoamVariant::FastTransition,
            AuthType::Cckm => RoamVariant::Cckm,
            _ => RoamVariant::Legacy,
        }
    }
}

/// Firmware-side query of the negotiated profile of a session.
pub trait ProfileSource {
    fn get_connection_profile(&self, session: SessionId) -> Option<ConnectionProfile>;
}
