//! A single-threaded [`LockstepHost`] for driving up to four in-process
//! `GameBoyAdvance`s without OS threads.
//!
//! Real hardware (and mGBA's own multi-process embedding) blocks a node on
//! a mutex/condvar while its siblings catch up. This crate is built on
//! `Rc`/`UnsafeCell` interior mutability (see `util.rs`) rather than
//! `Arc`/`Mutex`, so `LocalHub::wait` cannot suspend an OS thread — instead
//! it re-enters the siblings that haven't signaled yet and pumps them
//! forward itself, exactly the "continuation that re-queues the waiter"
//! alternative spec.md §9 calls out for a blocking rendezvous.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::lockstep::{LockstepHost, MAX_GBAS};

/// Drives one slot forward by up to `cycles` cycles. Registered by the
/// embedder once per attached node; typically a thin closure around that
/// node's `GameBoyAdvance::run(...)` (or just its `SioController`, for
/// tests that don't need a full console).
pub type Pump<'a> = Box<dyn FnMut(i32) + 'a>;

pub struct LocalHub<'a> {
    signaled: Cell<u32>,
    budget: [Cell<i32>; MAX_GBAS],
    pumps: Vec<Option<Pump<'a>>>,
}

impl<'a> LocalHub<'a> {
    pub fn new() -> LocalHub<'a> {
        LocalHub {
            signaled: Cell::new(0),
            budget: [Cell::new(0), Cell::new(0), Cell::new(0), Cell::new(0)],
            pumps: (0..MAX_GBAS).map(|_| None).collect(),
        }
    }

    /// Wires a slot's pump in. Call this once right after attaching the
    /// corresponding node to the link.
    pub fn register(&mut self, slot: usize, pump: Pump<'a>) {
        self.pumps[slot] = Some(pump);
    }

    /// If every bit in `mask` has been signaled, clears them and reports
    /// success. Broken out so [`SharedHub::wait`] can poll this without
    /// holding its `RefCell` borrow across a `pump()` call.
    fn try_consume_signal(&self, mask: u32) -> bool {
        if self.signaled.get() & mask == mask {
            self.signaled.set(self.signaled.get() & !mask);
            true
        } else {
            false
        }
    }

    fn is_signaled(&self, bit: u32) -> bool {
        self.signaled.get() & bit != 0
    }

    /// Takes a slot's pump out so it can be invoked without the hub
    /// borrowed, along with the cycle budget it should be pumped with.
    fn take_pump(&mut self, slot: usize) -> Option<(Pump<'a>, i32)> {
        let pump = self.pumps[slot].take()?;
        let cycles = self.budget[slot].replace(0).max(1);
        Some((pump, cycles))
    }

    fn return_pump(&mut self, slot: usize, pump: Pump<'a>) {
        self.pumps[slot] = Some(pump);
    }
}

impl Default for LocalHub<'_> {
    fn default() -> Self {
        LocalHub::new()
    }
}

impl LockstepHost for LocalHub<'_> {
    fn wait(&mut self, mask: u32) -> bool {
        // Bound the number of pump rounds: a well-formed link satisfies
        // `mask` within a handful of rounds since every slot only needs to
        // run forward to its own next scheduled event.
        for _ in 0..1024 {
            if self.try_consume_signal(mask) {
                return true;
            }
            let mut progressed = false;
            for slot in 0..MAX_GBAS {
                let bit = 1u32 << slot;
                if mask & bit == 0 || self.is_signaled(bit) {
                    continue;
                }
                if let Some((mut pump, cycles)) = self.take_pump(slot) {
                    pump(cycles);
                    self.return_pump(slot, pump);
                    progressed = true;
                }
            }
            if !progressed {
                return false;
            }
        }
        false
    }

    fn signal(&mut self, mask: u32) {
        self.signaled.set(self.signaled.get() | mask);
    }

    fn add_cycles(&mut self, slot: usize, cycles: i32) {
        if slot < MAX_GBAS {
            let current = self.budget[slot].get();
            self.budget[slot].set(current + cycles);
        }
    }

    fn use_cycles(&mut self, slot: usize, cycles: i32) -> i32 {
        if slot < MAX_GBAS {
            self.budget[slot].replace(0).max(cycles)
        } else {
            cycles
        }
    }

    fn unload(&mut self, slot: usize) {
        if slot < MAX_GBAS {
            self.pumps[slot] = None;
            self.signaled.set(self.signaled.get() & !(1 << slot));
        }
    }
}

/// A shared handle to a [`LocalHub`], so a slot's pump can be registered
/// *after* the node has attached (and so learned its slot id) instead of
/// requiring the whole hub mutably available before it's boxed into the
/// link. Real embedders hit this ordering problem too: `LockstepLink::new`
/// wants a host up front, but a pump naturally isn't known until its node
/// has attached.
#[derive(Clone)]
pub struct SharedHub(Rc<RefCell<LocalHub<'static>>>);

impl SharedHub {
    pub fn new() -> SharedHub {
        SharedHub(Rc::new(RefCell::new(LocalHub::new())))
    }

    pub fn register(&self, slot: usize, pump: Pump<'static>) {
        self.0.borrow_mut().register(slot, pump);
    }

    /// Boxes a clone of this handle as the [`LockstepHost`] a
    /// [`super::lockstep::LockstepLink`] owns. Keep the original `SharedHub`
    /// around to register pumps on afterwards.
    pub fn into_host(self) -> Box<dyn LockstepHost> {
        Box::new(self)
    }
}

impl Default for SharedHub {
    fn default() -> Self {
        SharedHub::new()
    }
}

impl LockstepHost for SharedHub {
    /// Unlike [`LocalHub::wait`], this must never hold the `RefCell`
    /// borrow across a `pump()` call: pumping a slave re-enters this same
    /// `SharedHub` (`slave_update` calls `signal`, then `process_events`
    /// calls `use_cycles`), and a `RefCell` does not allow a second
    /// `borrow_mut()` while the first is still live — that re-entry would
    /// panic with "already mutably borrowed". Each hub access below is
    /// its own short-lived borrow that ends before `pump()` runs.
    fn wait(&mut self, mask: u32) -> bool {
        for _ in 0..1024 {
            if self.0.borrow().try_consume_signal(mask) {
                return true;
            }
            let mut progressed = false;
            for slot in 0..MAX_GBAS {
                let bit = 1u32 << slot;
                if mask & bit == 0 || self.0.borrow().is_signaled(bit) {
                    continue;
                }
                let taken = self.0.borrow_mut().take_pump(slot);
                if let Some((mut pump, cycles)) = taken {
                    pump(cycles);
                    self.0.borrow_mut().return_pump(slot, pump);
                    progressed = true;
                }
            }
            if !progressed {
                return false;
            }
        }
        false
    }

    fn signal(&mut self, mask: u32) {
        self.0.borrow_mut().signal(mask)
    }

    fn add_cycles(&mut self, slot: usize, cycles: i32) {
        self.0.borrow_mut().add_cycles(slot, cycles)
    }

    fn use_cycles(&mut self, slot: usize, cycles: i32) -> i32 {
        self.0.borrow_mut().use_cycles(slot, cycles)
    }

    fn unload(&mut self, slot: usize) {
        self.0.borrow_mut().unload(slot)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn wait_returns_true_once_all_bits_signaled() {
        let mut hub = LocalHub::new();
        let ticks = Rc::new(RefCell::new(0));
        let ticks_clone = ticks.clone();
        // slot 1's pump signals itself as soon as it's pumped once.
        hub.register(
            1,
            Box::new(move |_cycles| {
                *ticks_clone.borrow_mut() += 1;
            }),
        );
        assert!(!hub.wait(0b10));
        // without a signal the pump keeps being invoked until the round cap;
        // simulate the sibling eventually calling signal() itself instead.
        hub.signal(0b10);
        assert!(hub.wait(0b10));
        assert_eq!(hub.wait(0b10), false, "mask is cleared after a successful wait");
    }

    #[test]
    fn add_and_use_cycles_round_trip() {
        let mut hub = LocalHub::new();
        hub.add_cycles(2, 500);
        assert_eq!(hub.use_cycles(2, 10), 500);
        // budget was consumed
        assert_eq!(hub.use_cycles(2, 10), 10);
    }

    #[test]
    fn unload_clears_pump_and_signal_bit() {
        let mut hub = LocalHub::new();
        hub.register(0, Box::new(|_| {}));
        hub.signal(0b1);
        hub.unload(0);
        assert!(!hub.wait(0b1));
    }

    /// A `SharedHub`-backed pump that itself calls back into the same
    /// `SharedHub` (`signal` then `use_cycles`) while `wait` is still
    /// pumping it, exactly what `LockstepNode::slave_update`/
    /// `process_events` do. Before the fix this panicked with "already
    /// mutably borrowed" the first time `wait` pumped such a slot.
    #[test]
    fn wait_tolerates_a_pump_that_reenters_the_shared_hub() {
        let hub = SharedHub::new();
        let mut reentrant_host = hub.clone();
        hub.register(
            1,
            Box::new(move |cycles| {
                reentrant_host.signal(0b10);
                reentrant_host.use_cycles(1, cycles);
            }),
        );
        let mut host = hub;
        assert!(host.wait(0b10), "reentrant pump must not panic and must still signal");
    }
}
