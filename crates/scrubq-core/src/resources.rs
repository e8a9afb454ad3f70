//! Node-wide scrub slot accounting.
//!
//! A scrub occupies one slot on every node taking part: a *local* slot on the
//! primary that drives it and a *remote* slot on each replica. Both kinds draw
//! from the same `max_scrubs` budget so total scrub concurrency on a node stays
//! bounded. The counters have their own lock, never taken while the queue lock
//! is held.

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct Slots {
    local: i32,
    remote: i32,
}

/// Reservation counts for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReservationSnapshot {
    pub scrubs_local: i32,
    pub scrubs_remote: i32,
    pub max_scrubs: i32,
}

/// Shared scrub slot budget.
#[derive(Debug)]
pub struct ResourceGate {
    max_scrubs: i32,
    slots: Mutex<Slots>,
}

impl ResourceGate {
    pub fn new(max_scrubs: u32) -> Self {
        Self {
            max_scrubs: i32::try_from(max_scrubs).unwrap_or(i32::MAX),
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn max_scrubs(&self) -> i32 {
        self.max_scrubs
    }

    /// True if another scrub (of either kind) would fit.
    pub fn can_start(&self) -> bool {
        let slots = self.slots.lock();
        let ok = slots.local + slots.remote < self.max_scrubs;
        if !ok {
            tracing::trace!(
                local = slots.local,
                remote = slots.remote,
                max = self.max_scrubs,
                "no scrub slots free"
            );
        }
        ok
    }

    /// Reserve a slot for a scrub this node drives. False (and no change) if full.
    pub fn try_acquire_local(&self) -> bool {
        self.try_acquire(|slots| &mut slots.local, "local")
    }

    /// Reserve a slot on behalf of a remote primary. False (and no change) if full.
    pub fn try_acquire_remote(&self) -> bool {
        self.try_acquire(|slots| &mut slots.remote, "remote")
    }

    /// Return a local slot.
    ///
    /// # Panics
    /// If no local slot is held: the counters are corrupt.
    pub fn release_local(&self) {
        self.release(|slots| &mut slots.local, "local");
    }

    /// Return a remote slot.
    ///
    /// # Panics
    /// If no remote slot is held: the counters are corrupt.
    pub fn release_remote(&self) {
        self.release(|slots| &mut slots.remote, "remote");
    }

    pub fn snapshot(&self) -> ReservationSnapshot {
        let slots = self.slots.lock();
        ReservationSnapshot {
            scrubs_local: slots.local,
            scrubs_remote: slots.remote,
            max_scrubs: self.max_scrubs,
        }
    }

    fn try_acquire(&self, counter: impl FnOnce(&mut Slots) -> &mut i32, kind: &str) -> bool {
        let mut slots = self.slots.lock();
        let (local, remote) = (slots.local, slots.remote);
        if local + remote >= self.max_scrubs {
            tracing::trace!(kind, local, remote, max = self.max_scrubs, "slot reservation refused");
            return false;
        }
        let n = counter(&mut *slots);
        *n += 1;
        tracing::trace!(kind, now = *n, "slot reserved");
        true
    }

    fn release(&self, counter: impl FnOnce(&mut Slots) -> &mut i32, kind: &str) {
        let mut slots = self.slots.lock();
        let n = counter(&mut *slots);
        *n -= 1;
        let now = *n;
        assert!(now >= 0, "{kind} scrub slot count went negative ({now})");
        tracing::trace!(kind, now, "slot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn local_and_remote_share_budget() {
        let gate = ResourceGate::new(2);
        assert!(gate.can_start());
        assert!(gate.try_acquire_local());
        assert!(gate.try_acquire_local());
        assert!(!gate.can_start());
        assert!(!gate.try_acquire_local());
        assert!(!gate.try_acquire_remote());
        assert_eq!(
            gate.snapshot(),
            ReservationSnapshot {
                scrubs_local: 2,
                scrubs_remote: 0,
                max_scrubs: 2
            }
        );

        gate.release_local();
        assert!(gate.try_acquire_remote());
        assert_eq!(gate.snapshot().scrubs_local, 1);
        assert_eq!(gate.snapshot().scrubs_remote, 1);
    }

    #[test]
    #[should_panic(expected = "went negative")]
    fn releasing_unheld_slot_is_fatal() {
        let gate = ResourceGate::new(1);
        gate.release_remote();
    }

    #[test]
    fn concurrent_acquire_never_exceeds_budget() {
        let gate = Arc::new(ResourceGate::new(3));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let acquired = if i % 2 == 0 {
                            gate.try_acquire_local()
                        } else {
                            gate.try_acquire_remote()
                        };
                        let snap = gate.snapshot();
                        assert!(snap.scrubs_local >= 0 && snap.scrubs_remote >= 0);
                        assert!(snap.scrubs_local + snap.scrubs_remote <= 3);
                        if acquired {
                            if i % 2 == 0 {
                                gate.release_local();
                            } else {
                                gate.release_remote();
                            }
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = gate.snapshot();
        assert_eq!((snap.scrubs_local, snap.scrubs_remote), (0, 0));
    }
}
