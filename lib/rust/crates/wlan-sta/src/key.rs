// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::peer::PeerEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    Pairwise,
    Group,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyProgress {
    /// Still waiting for the other key.
    Pending,
    /// Both keys are in; the peer was already authenticated (re-key).
    Complete,
    /// Both keys are in and the peer must now be promoted to authenticated.
    Promote,
}

/// Records a completed key installation for `entry`.
///
/// Both the pairwise and the group key are required, in either order, unless
/// `group_key_suffices` is set because a roam carried the pairwise key over. Once the set is
/// complete the flags reset so a later re-key goes through the same tracking.
pub fn record_key_installed(
    entry: &mut PeerEntry,
    key_type: KeyType,
    group_key_suffices: bool,
) -> KeyProgress {
    match key_type {
        KeyType::Pairwise => entry.ptk_installed = true,
        KeyType::Group => entry.gtk_installed = true,
    }
    let complete = entry.gtk_installed && (entry.ptk_installed || group_key_suffices);
    if !complete {
        return KeyProgress::Pending;
    }
    entry.ptk_installed = false;
    entry.gtk_installed = false;
    if entry.authenticated {
        KeyProgress::Complete
    } else {
        KeyProgress::Promote
    }
}
