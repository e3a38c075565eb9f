// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::SessionId,
    std::{collections::HashMap, time::Duration},
};

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// A scheduler to schedule and cancel deferred work on behalf of a session.
pub trait Scheduler {
    /// Requests to schedule an event. Returns a unique ID used to cancel the scheduled event.
    fn schedule(&mut self, session: SessionId, delay: Duration) -> EventId;
    /// Cancels a previously scheduled event.
    fn cancel(&mut self, event_id: EventId);
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    session: SessionId,
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(session: SessionId, scheduler: Box<dyn Scheduler>) -> Self {
        Self { session, events: HashMap::default(), scheduler }
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_event(&mut self, delay: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(self.session, delay);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        if self.events.remove(&event_id).is_some() {
            self.scheduler.cancel(event_id);
        }
    }

    pub fn cancel_all(&mut self) {
        for event_id in self.events.keys() {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
pub use self::fake::{FakeScheduler, FakeSchedulerState};

#[cfg(test)]
mod fake {
    use {super::*, parking_lot::Mutex, std::sync::Arc};

    #[derive(Debug, Default)]
    pub struct FakeSchedulerState {
        next_id: u64,
        pub scheduled: Vec<(EventId, SessionId, Duration)>,
        pub canceled: Vec<EventId>,
    }

    impl FakeSchedulerState {
        /// Scheduled events that were not canceled, oldest first.
        pub fn live(&self) -> Vec<EventId> {
            self.scheduled
                .iter()
                .map(|(id, _, _)| *id)
                .filter(|id| !self.canceled.contains(id))
                .collect()
        }
    }

    /// Hands out increasing event ids and records every call. Clones share state.
    #[derive(Clone, Debug, Default)]
    pub struct FakeScheduler {
        pub state: Arc<Mutex<FakeSchedulerState>>,
    }

    impl FakeScheduler {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&mut self, session: SessionId, delay: Duration) -> EventId {
            let mut state = self.state.lock();
            state.next_id += 1;
            let event_id = EventId(state.next_id);
            state.scheduled.push((event_id, session, delay));
            event_id
        }

        fn cancel(&mut self, event_id: EventId) {
            self.state.lock().canceled.push(event_id);
        }
    }
}
