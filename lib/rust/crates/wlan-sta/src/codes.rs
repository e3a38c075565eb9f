// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct StatusCode(pub u16);

/// IEEE Std 802.11-2016, 9.4.1.9
impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const REFUSED_REASON_UNSPECIFIED: Self = Self(1);
    pub const REFUSED_CAPABILITIES_MISMATCH: Self = Self(10);
    pub const DENIED_NO_MORE_STAS: Self = Self(17);
    pub const REJECTED_SEQUENCE_TIMEOUT: Self = Self(56);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct ReasonCode(pub u16);

/// IEEE Std 802.11-2016, 9.4.1.7
impl ReasonCode {
    // 0 Reserved
    pub const UNSPECIFIED_REASON: Self = Self(1);
    pub const LEAVING_NETWORK_DEAUTH: Self = Self(3);
    pub const REASON_INACTIVITY: Self = Self(4);
    pub const LEAVING_NETWORK_DISASSOC: Self = Self(8);
    pub const MIC_FAILURE: Self = Self(14);
    pub const FOURWAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const TIMEOUT: Self = Self(39);
    pub const REASON_INVALID_FT_ACTION_FRAME_COUNT: Self = Self(48);
}
