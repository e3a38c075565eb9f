// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {futures::channel::mpsc, log::warn, std::cell::Cell};

/// Sender half of an unbounded channel that never fails the caller. Once the receiver is gone,
/// messages are dropped and the loss is logged a single time.
#[derive(Debug)]
pub struct UnboundedSink<T> {
    sink: mpsc::UnboundedSender<T>,
    dropped: Cell<u64>,
}

impl<T> UnboundedSink<T> {
    pub fn new(sink: mpsc::UnboundedSender<T>) -> Self {
        UnboundedSink { sink, dropped: Cell::new(0) }
    }

    pub fn send(&self, msg: T) {
        if let Err(e) = self.sink.unbounded_send(msg) {
            if self.dropped.get() == 0 {
                warn!("notification receiver is gone ({}); dropping notifications", e);
            }
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    /// Messages dropped because the receiver was closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }
}

pub type NotificationSink = UnboundedSink<crate::notify::Notification>;
