// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Reusable rendezvous gate for blocking handoffs between threads.
//!
//! A [`RendezvousGate`] behaves like a manual-reset event layered on an
//! N-party barrier:
//!
//! - [`RendezvousGate::meet`] blocks the caller until the gate is released.
//! - [`RendezvousGate::force`] releases every waiter and leaves the gate open,
//!   so parties arriving later pass straight through.
//! - [`RendezvousGate::reset`] closes the gate again.
//! - With a party count, the arrival that completes the group releases the
//!   whole group and the gate re-arms for the next one.
//!
//! The stickiness of `force()` is what lets a producer announce "new data" to
//! a consumer that has not started waiting yet. Callers that block on a gate
//! must reset it *before* checking the condition they wait for, then meet:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use circbuf::RendezvousGate;
//!
//! let gate = Arc::new(RendezvousGate::unbounded());
//! let ready = Arc::new(Mutex::new(false));
//!
//! let signaller = {
//!     let (gate, ready) = (gate.clone(), ready.clone());
//!     std::thread::spawn(move || {
//!         *ready.lock().unwrap() = true;
//!         gate.force();
//!     })
//! };
//!
//! loop {
//!     gate.reset();
//!     if *ready.lock().unwrap() {
//!         break;
//!     }
//!     gate.meet();
//! }
//! signaller.join().unwrap();
//! ```

use std::{
    num::NonZeroUsize,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

#[derive(Debug, Default)]
struct GateState {
    /// Bumped every time a group of waiters is released.
    epoch: u64,
    /// Parties currently blocked in the open group.
    arrived: usize,
    /// Sticky release set by `force()` and cleared by `reset()`.
    forced: bool,
}

/// Blocking rendezvous point shared by a fixed or unbounded number of parties.
///
/// Misuse (for example a party meeting a gate nobody will ever force) is a
/// deadlock in the caller, not something the gate can detect.
#[derive(Debug)]
pub struct RendezvousGate {
    parties: Option<NonZeroUsize>,
    state: Mutex<GateState>,
    released: Condvar,
}

impl RendezvousGate {
    /// Creates a gate that also opens on its own once `parties` callers have met.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{num::NonZeroUsize, sync::Arc};
    /// use circbuf::RendezvousGate;
    ///
    /// let gate = Arc::new(RendezvousGate::new(NonZeroUsize::new(2).unwrap()));
    /// let other = gate.clone();
    /// let worker = std::thread::spawn(move || other.meet());
    /// gate.meet(); // returns once both sides have arrived
    /// worker.join().unwrap();
    /// ```
    pub fn new(parties: NonZeroUsize) -> Self {
        Self {
            parties: Some(parties),
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
        }
    }

    /// Creates a gate that only [`Self::force`] can open.
    pub fn unbounded() -> Self {
        Self {
            parties: None,
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
        }
    }

    /// Returns the number of parties that complete a group, if bounded.
    pub fn parties(&self) -> Option<NonZeroUsize> {
        self.parties
    }

    /// Blocks until the gate is released.
    ///
    /// Returns immediately while the gate is forced.
    pub fn meet(&self) {
        let mut state = self.lock();
        let Some(epoch) = self.arrive(&mut state) else {
            return;
        };
        while !state.forced && state.epoch == epoch {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the gate is released or `timeout` elapses.
    ///
    /// Returns `true` if the gate released the caller, `false` on timeout. A
    /// timed-out caller leaves the open group.
    pub fn meet_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.lock();
        let Some(epoch) = self.arrive(&mut state) else {
            return true;
        };
        let (mut state, result) = self
            .released
            .wait_timeout_while(state, timeout, |state| {
                !state.forced && state.epoch == epoch
            })
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            state.arrived = state.arrived.saturating_sub(1);
            false
        } else {
            true
        }
    }

    /// Releases all current waiters and keeps the gate open until [`Self::reset`].
    pub fn force(&self) {
        let mut state = self.lock();
        state.forced = true;
        state.arrived = 0;
        state.epoch = state.epoch.wrapping_add(1);
        self.released.notify_all();
    }

    /// Re-arms the gate so that subsequent [`Self::meet`] calls block again.
    pub fn reset(&self) {
        self.lock().forced = false;
    }

    /// Returns whether the gate is currently held open by [`Self::force`].
    pub fn is_forced(&self) -> bool {
        self.lock().forced
    }

    /// Registers an arrival. Returns the epoch to wait on, or `None` when the
    /// caller passes straight through.
    fn arrive(&self, state: &mut GateState) -> Option<u64> {
        if state.forced {
            return None;
        }
        state.arrived += 1;
        if let Some(parties) = self.parties
            && state.arrived >= parties.get()
        {
            state.arrived = 0;
            state.epoch = state.epoch.wrapping_add(1);
            self.released.notify_all();
            return None;
        }
        Some(state.epoch)
    }

    // Gate state holds no invariant a panicking holder could break halfway.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
