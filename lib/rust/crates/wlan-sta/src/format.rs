// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::MacAddr;

pub trait MacFmt {
    fn to_mac_str(&self) -> String;
}

impl MacFmt for MacAddr {
    fn to_mac_str(&self) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5]
        )
    }
}

pub trait SsidFmt {
    fn to_ssid_str(&self) -> String;
}

impl SsidFmt for [u8] {
    fn to_ssid_str(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }
}
