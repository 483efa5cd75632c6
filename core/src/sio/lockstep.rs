//! The deterministic lockstep synchronizer for GBA multiplayer link cable
//! emulation (spec.md §4.1-§4.3).
//!
//! Up to [`MAX_GBAS`] [`LockstepNode`]s share one [`LockstepLink`]. The node
//! with slot id 0 is the master and is the sole writer of `phase`; every
//! other attached node is a slave and only reacts to it. Suspension only
//! ever happens inside [`LockstepHost::wait`] — everything else here is
//! plain single-threaded bookkeeping, safe to drive from this crate's
//! `Rc`/`UnsafeCell`-based `Shared<T>` (no node is ever accessed from two
//! OS threads at once).

use std::cell::Cell;
use std::rc::Rc;

use crate::interrupt::{signal_irq, Interrupt, SharedInterruptFlags};

use super::regs::{cycles_per_transfer, SiocntMulti, SiocntNormal, CPU_HZ, SioMode};

/// A link group supports at most four attached GBAs (one parent, three
/// children), mirroring real MULTI-PLAY hardware.
pub const MAX_GBAS: usize = 4;

/// How far, in cycles, the master is allowed to let its virtual clock run
/// ahead while idling between transfers (spec.md §5).
pub const LOCKSTEP_INCREMENT: i32 = 3000;

/// Bus-idle sentinel latched into `multi_recv` for any slot that didn't
/// (yet) contribute a send word to the current transfer.
pub const MULTI_RECV_IDLE: u16 = 0xFFFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Started,
    Finishing,
    Finished,
}

/// The four suspension/scheduling hooks the embedder must provide
/// (spec.md §3, §5). `wait` is the only one allowed to block; the other
/// three must return immediately.
pub trait LockstepHost {
    /// Block until every slot in `mask` has called `signal` for its bit
    /// since the last `wait`. Returns `false` on unrecoverable
    /// host-scheduling failure (spec.md §4.1, §7 "scheduler-failure").
    fn wait(&mut self, mask: u32) -> bool;
    /// Release any waiter blocked on bits in `mask`.
    fn signal(&mut self, mask: u32);
    /// Extend `slot`'s cycle budget so it may catch up to the caller.
    fn add_cycles(&mut self, slot: usize, cycles: i32);
    /// Consume `cycles` from the caller's own budget, returning how many
    /// cycles the node may run before its next required invocation.
    fn use_cycles(&mut self, slot: usize, cycles: i32) -> i32;
    /// Called when a node detaches; lets the embedder tear down whatever
    /// per-slot scheduling state it was keeping.
    fn unload(&mut self, slot: usize);
}

/// A node's slot index into the shared arrays. Implemented as a shared
/// handle rather than a raw index so that `LockstepLink::detach` can
/// renumber the *other* attached nodes without needing a back-pointer to
/// them (spec.md §9, "pointer-heavy shared graph").
pub type SlotId = Rc<Cell<usize>>;

struct Player {
    id: SlotId,
    mode: SioMode,
}

/// The shared rendezvous object for one link group (spec.md §3).
pub struct LockstepLink {
    players: Vec<Player>,
    attached_multi: usize,
    phase: Phase,
    transfer_cycles: i32,
    multi_recv: [u16; MAX_GBAS],
    normal_recv: [u32; MAX_GBAS],
    host: Box<dyn LockstepHost>,
}

impl LockstepLink {
    pub fn new(host: Box<dyn LockstepHost>) -> LockstepLink {
        LockstepLink {
            players: Vec::with_capacity(MAX_GBAS),
            attached_multi: 0,
            phase: Phase::Idle,
            transfer_cycles: 0,
            multi_recv: [MULTI_RECV_IDLE; MAX_GBAS],
            normal_recv: [0; MAX_GBAS],
            host,
        }
    }

    #[inline]
    pub fn attached(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn attached_multi(&self) -> usize {
        self.attached_multi
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// `attach(node)` in spec.md §4.3: fails when already at [`MAX_GBAS`].
    pub fn attach(&mut self) -> Option<SlotId> {
        if self.players.len() == MAX_GBAS {
            return None;
        }
        let id = Rc::new(Cell::new(self.players.len()));
        self.players.push(Player {
            id: id.clone(),
            mode: SioMode::None,
        });
        Some(id)
    }

    /// `detach(node)` in spec.md §4.3: removes in place, shifts the
    /// remaining nodes down, and renumbers their `id` so that
    /// `players[i].id == i` continues to hold (Testable Property 1).
    pub fn detach(&mut self, id: &SlotId) {
        if let Some(index) = self.players.iter().position(|p| Rc::ptr_eq(&p.id, id)) {
            if self.players[index].mode == SioMode::Multi {
                self.attached_multi = self.attached_multi.saturating_sub(1);
            }
            self.players.remove(index);
            for (i, player) in self.players.iter_mut().enumerate().skip(index) {
                player.id.set(i);
            }
            self.host.unload(index);
        }
    }

    fn set_mode(&mut self, id: usize, mode: SioMode) {
        let was_multi = self.players[id].mode == SioMode::Multi;
        let is_multi = mode == SioMode::Multi;
        self.players[id].mode = mode;
        if is_multi && !was_multi {
            self.attached_multi += 1;
        } else if was_multi && !is_multi {
            self.attached_multi = self.attached_multi.saturating_sub(1);
        }
    }

    /// Rendezvous mask: every attached slave whose current mode matches
    /// the master's, i.e. the set of nodes that actually participate in
    /// this transfer (spec.md §4.1 "Tie-breaks", §7 "mode-mismatch").
    fn mode_mask(&self, mode: SioMode) -> u32 {
        let mut mask = 0u32;
        for player in self.players.iter().skip(1) {
            if player.mode == mode {
                mask |= 1 << player.id.get();
            }
        }
        mask
    }
}

/// Per-node driver state (spec.md §3 "Lockstep node").
pub struct LockstepNode {
    link: super::SharedLink,
    id: SlotId,
    mode: SioMode,
    next_event: i32,
    event_diff: i32,
    transfer_finished: bool,
}

/// The hardware-observable registers a [`LockstepNode`] reads and writes.
/// Stands in for "the memory map ... assumed defined elsewhere" of
/// spec.md §1: whatever owns the real SIOCNT/SIOMULTIn/SIODATAn/RCNT
/// storage hands a borrow of this view to the node for the duration of one
/// register write or scheduler tick.
pub struct SioView<'a> {
    pub siocnt: &'a mut u16,
    pub rcnt: &'a mut u16,
    pub siomulti: &'a mut [u16; 4],
    pub mlt_send: &'a mut u16,
    pub siodata8: &'a mut u16,
    pub siodata32: &'a mut u32,
    pub interrupt_flags: &'a SharedInterruptFlags,
}

impl SioView<'_> {
    fn raise_irq(&self) {
        signal_irq(self.interrupt_flags, Interrupt::SerialCommunication);
    }
}

impl LockstepNode {
    pub fn new(link: super::SharedLink, id: SlotId) -> LockstepNode {
        LockstepNode {
            link,
            id,
            mode: SioMode::None,
            next_event: 0,
            event_diff: 0,
            transfer_finished: true,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id.get()
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.id.get() == 0
    }

    pub fn load(&mut self, mode: SioMode) {
        self.next_event = 0;
        self.event_diff = 0;
        self.mode = mode;
        self.link.set_mode(self.id.get(), mode);
    }

    pub fn unload(&mut self) {
        self.link.detach(&self.id);
    }

    /// Dispatches a SIOCNT write in MULTI mode (spec.md §6).
    pub fn write_siocnt_multi(&mut self, view: &mut SioView, mut value: u16) -> u16 {
        if value & 0x0080 != 0 && self.link.phase() == Phase::Idle {
            let ready = self.link.attached_multi() == self.link.attached();
            if self.is_master() && ready {
                let baud = SiocntMulti(value).baud();
                self.link.begin_starting(baud as u8, self.link.attached());
                self.next_event = 0;
            } else {
                value &= !0x0080;
            }
        }
        value &= 0xFF83;
        value |= *view.siocnt & 0x00FC;
        value
    }

    /// Dispatches a SIOCNT write in NORMAL-8/32 mode (spec.md §6).
    pub fn write_siocnt_normal(&mut self, value: u16) -> u16 {
        let masked = value & 0xFF8B;
        let mut reg = SiocntNormal(masked);
        if self.is_master() && reg.start() {
            // Only the internal clock source (`shift_clock_internal`) is
            // what actually drives a transfer; an externally-clocked
            // write latches the start bit but waits for the other side.
            if reg.shift_clock_internal() {
                self.link.begin_starting_normal();
            }
            // the frequency-divider bit: `internal_shift_clock_speed` set
            // selects the faster 2MHz clock (CPU_HZ/1024), clear selects
            // 256KHz (CPU_HZ/8192).
            let cycles = if reg.internal_shift_clock_speed() {
                CPU_HZ / 1024
            } else {
                CPU_HZ / 8192
            };
            self.link.set_transfer_cycles(cycles);
        }
        if self.is_master() {
            reg.set_si_state(true); // si forced high on the parent
        }
        reg.0
    }

    /// Runs up to `cycles` worth of time on this node, returning how many
    /// cycles until the next required invocation (spec.md §6
    /// `processEvents`).
    pub fn process_events(&mut self, view: &mut SioView, cycles: i32) -> i32 {
        if self.link.attached() < 2 {
            return i32::MAX;
        }
        self.event_diff += cycles;
        self.next_event -= cycles;
        let mut result = self.next_event;
        if self.next_event <= 0 {
            result = if self.is_master() {
                self.master_update(view)
            } else {
                let r = self.slave_update(view);
                self.next_event += self.link.use_cycles(self.id.get(), self.event_diff);
                r
            };
            self.event_diff = 0;
        }
        result.max(0)
    }

    fn master_update(&mut self, view: &mut SioView) -> i32 {
        let mut needs_wait = false;
        match self.link.phase() {
            Phase::Idle => {
                self.next_event += LOCKSTEP_INCREMENT;
            }
            Phase::Starting => {
                self.transfer_finished = false;
                self.link.reset_multi_recv();
                needs_wait = true;
                self.link.set_phase(Phase::Started);
                self.next_event += 512;
            }
            Phase::Started => {
                self.link.write_multi_recv(0, *view.mlt_send);
                self.next_event += 512;
                self.link.set_phase(Phase::Finishing);
            }
            Phase::Finishing => {
                self.next_event += self.link.transfer_cycles() - 1024;
                needs_wait = true;
                self.link.set_phase(Phase::Finished);
            }
            Phase::Finished => {
                self.finish_transfer(view);
                self.next_event += LOCKSTEP_INCREMENT;
                self.link.set_phase(Phase::Idle);
            }
        }
        let mask = self.link.mode_mask(self.mode);
        if mask != 0 {
            if needs_wait {
                if !self.link.wait(mask) {
                    // spec.md §7: scheduler-failure is unrecoverable.
                    panic!("lockstep host reported an unrecoverable wait failure");
                }
            } else {
                self.link.signal(mask);
            }
        }
        self.link.add_cycles(0, self.event_diff);
        if needs_wait {
            0
        } else {
            self.next_event
        }
    }

    fn slave_update(&mut self, view: &mut SioView) -> i32 {
        let id = self.id.get();
        let mut signal = false;
        match self.link.phase() {
            Phase::Idle => {
                if !self.link.ready() {
                    self.link.add_cycles(id, LOCKSTEP_INCREMENT);
                }
            }
            Phase::Starting | Phase::Finishing => {}
            Phase::Started => {
                self.transfer_finished = false;
                match self.mode {
                    SioMode::Multi => {
                        *view.rcnt &= !1;
                        self.link.write_multi_recv(id, *view.mlt_send);
                        *view.siomulti = [MULTI_RECV_IDLE; 4];
                        *view.siocnt |= 0x0080; // busy
                    }
                    SioMode::Normal8 => {
                        self.link.write_normal_recv(id, *view.siodata8 as u32 & 0xFF);
                    }
                    SioMode::Normal32 => {
                        self.link.write_normal_recv(id, *view.siodata32);
                    }
                    SioMode::None => {}
                }
                signal = true;
            }
            Phase::Finished => {
                self.finish_transfer(view);
                signal = true;
            }
        }
        if signal {
            self.link.signal(1 << id);
        }
        0
    }

    /// Finish a transfer (spec.md §4.2). Idempotent: re-entering while
    /// `transfer_finished` is already true is a no-op.
    ///
    /// Known limitation (spec.md §9 Open Question (b)): NORMAL-8/32 on
    /// real hardware also propagate the previous slot's `idleSo` bit into
    /// this node's `si` line; `SioView` has no handle onto a sibling's
    /// SIOCNT to read that bit back, and the reference source's own
    /// handling of it was itself marked `// TODO`, so it's left
    /// unmodeled here rather than guessed at.
    fn finish_transfer(&mut self, view: &mut SioView) {
        if self.transfer_finished {
            return;
        }
        let id = self.id.get();
        match self.mode {
            SioMode::Multi => {
                *view.siomulti = self.link.multi_recv();
                *view.rcnt |= 1;
                *view.siocnt &= !0x0080; // busy cleared
                *view.siocnt = (*view.siocnt & !0x0030) | ((id as u16 & 3) << 4);
                if *view.siocnt & 0x4000 != 0 {
                    view.raise_irq();
                }
            }
            SioMode::Normal8 => {
                *view.siocnt &= !0x0080; // start cleared
                if id > 0 {
                    *view.siodata8 = self.link.normal_recv()[id - 1] & 0xFF;
                } else {
                    *view.siodata8 = 0xFFFF;
                }
                if *view.siocnt & 0x4000 != 0 {
                    view.raise_irq();
                }
            }
            SioMode::Normal32 => {
                *view.siocnt &= !0x0080;
                if id > 0 {
                    *view.siodata32 = self.link.normal_recv()[id - 1];
                } else {
                    *view.siodata32 = 0xFFFF_FFFF;
                }
                if *view.siocnt & 0x4000 != 0 {
                    view.raise_irq();
                }
            }
            SioMode::None => {}
        }
        self.transfer_finished = true;
    }
}

// --- LockstepLink helpers used by LockstepNode, kept in a Cell-free
// single-owner form so the node can call through a `Shared<LockstepLink>`
// without borrow-checker friction. ---
impl LockstepLink {
    fn begin_starting(&mut self, baud: u8, attached: usize) {
        self.transfer_cycles = cycles_per_transfer(baud, attached);
        self.phase = Phase::Starting;
    }

    fn begin_starting_normal(&mut self) {
        self.phase = Phase::Starting;
    }

    fn set_transfer_cycles(&mut self, cycles: i32) {
        self.transfer_cycles = cycles;
    }

    fn transfer_cycles(&self) -> i32 {
        self.transfer_cycles
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    fn reset_multi_recv(&mut self) {
        self.multi_recv = [MULTI_RECV_IDLE; MAX_GBAS];
    }

    fn write_multi_recv(&mut self, slot: usize, value: u16) {
        self.multi_recv[slot] = value;
    }

    fn multi_recv(&self) -> [u16; MAX_GBAS] {
        self.multi_recv
    }

    fn write_normal_recv(&mut self, slot: usize, value: u32) {
        self.normal_recv[slot] = value;
    }

    fn normal_recv(&self) -> [u32; MAX_GBAS] {
        self.normal_recv
    }

    fn ready(&self) -> bool {
        self.attached_multi == self.players.len()
    }

    fn wait(&mut self, mask: u32) -> bool {
        self.host.wait(mask)
    }

    fn signal(&mut self, mask: u32) {
        self.host.signal(mask)
    }

    fn add_cycles(&mut self, slot: usize, cycles: i32) {
        self.host.add_cycles(slot, cycles)
    }

    fn use_cycles(&mut self, slot: usize, cycles: i32) -> i32 {
        self.host.use_cycles(slot, cycles)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interrupt::IrqBitmask;
    use crate::sio::hub::SharedHub;
    use std::cell::RefCell;

    /// A node's hardware-observable registers, owned by the test harness
    /// instead of a real `SioController` (spec.md §1: the memory map is an
    /// external collaborator this crate stands in for with [`SioView`]).
    struct Regs {
        siocnt: u16,
        rcnt: u16,
        siomulti: [u16; 4],
        mlt_send: u16,
        siodata8: u16,
        siodata32: u32,
        interrupt_flags: SharedInterruptFlags,
    }

    impl Regs {
        fn new() -> Regs {
            Regs {
                siocnt: 0,
                rcnt: 0,
                siomulti: [MULTI_RECV_IDLE; 4],
                mlt_send: 0,
                siodata8: 0,
                siodata32: 0,
                interrupt_flags: Rc::new(Cell::new(IrqBitmask::default())),
            }
        }

        fn view(&mut self) -> SioView {
            SioView {
                siocnt: &mut self.siocnt,
                rcnt: &mut self.rcnt,
                siomulti: &mut self.siomulti,
                mlt_send: &mut self.mlt_send,
                siodata8: &mut self.siodata8,
                siodata32: &mut self.siodata32,
                interrupt_flags: &self.interrupt_flags,
            }
        }

        fn irq_raised(&self) -> bool {
            self.interrupt_flags.get().SerialCommunication()
        }
    }

    /// Wires up `n` MULTI-mode nodes sharing one [`LockstepLink`]: node 0 is
    /// the master, driven directly by the test; nodes 1..n are slaves,
    /// pumped automatically by the shared hub whenever the master blocks on
    /// `wait`. Each node/register-bank pair gets its own `RefCell` (rather
    /// than one `RefCell` over the whole `Vec`) because the master's own
    /// `wait()` call re-enters through the hub to pump the slaves — a
    /// single shared `RefCell` would see that as a double mutable borrow
    /// and panic.
    fn harness(n: usize) -> (super::super::SharedLink, Vec<Rc<RefCell<LockstepNode>>>, Vec<Rc<RefCell<Regs>>>) {
        let hub = SharedHub::new();
        let mut link = super::super::SharedLink::new(LockstepLink::new(hub.clone().into_host()));
        let mut nodes = Vec::new();
        let mut regs = Vec::new();

        for _ in 0..n {
            let id = link.attach().expect("attach should succeed under MAX_GBAS");
            let mut node = LockstepNode::new(link.clone(), id);
            node.load(SioMode::Multi);
            nodes.push(Rc::new(RefCell::new(node)));
            regs.push(Rc::new(RefCell::new(Regs::new())));
        }

        for slot in 1..n {
            let node = nodes[slot].clone();
            let reg = regs[slot].clone();
            hub.register(
                slot,
                Box::new(move |cycles| {
                    let mut reg = reg.borrow_mut();
                    let mut view = reg.view();
                    node.borrow_mut().process_events(&mut view, cycles);
                }),
            );
        }

        (link, nodes, regs)
    }

    /// Drives the master (slot 0) forward, pumping slaves transitively
    /// through `wait`, until the link returns to `Idle` (one full transfer
    /// completed) or `max_iters` is exceeded.
    fn run_master_to_idle(
        link: &super::super::SharedLink,
        nodes: &[Rc<RefCell<LockstepNode>>],
        regs: &[Rc<RefCell<Regs>>],
        max_iters: usize,
    ) -> bool {
        let mut cycles = 1;
        for _ in 0..max_iters {
            let next = {
                let mut reg = regs[0].borrow_mut();
                let mut view = reg.view();
                nodes[0].borrow_mut().process_events(&mut view, cycles)
            };
            if link.phase() == Phase::Idle {
                return true;
            }
            cycles = next.max(1);
        }
        false
    }

    #[test]
    fn s1_two_node_multi_transfer() {
        let (link, nodes, regs) = harness(2);
        regs[0].borrow_mut().mlt_send = 0x1111;
        regs[1].borrow_mut().mlt_send = 0x2222;

        // A writes SIOCNT with the start bit set.
        let started = {
            let mut reg = regs[0].borrow_mut();
            let mut view = reg.view();
            nodes[0].borrow_mut().write_siocnt_multi(&mut view, 0x0080)
        };
        assert_eq!(started & 0x0080, 0x0080, "start bit latches for the ready master");

        assert!(
            run_master_to_idle(&link, &nodes, &regs, 32),
            "transfer should complete and return the link to Idle"
        );

        for (who, r) in [("A", &regs[0]), ("B", &regs[1])] {
            let r = r.borrow();
            assert_eq!(r.siomulti, [0x1111, 0x2222, 0xFFFF, 0xFFFF], "{who} sees the shared transfer result");
            assert_eq!(r.siocnt & 0x0080, 0, "{who} busy bit cleared");
        }
        assert_eq!((regs[0].borrow().siocnt >> 4) & 3, 0, "A observes its own id");
        assert_eq!((regs[1].borrow().siocnt >> 4) & 3, 1, "B observes its own id");
    }

    #[test]
    fn s1_irq_pulses_only_when_armed() {
        let (link, nodes, regs) = harness(2);
        // The slave already has its IRQ-enable bit latched from an earlier
        // register write; the master latches it in the same write that
        // sets the start bit.
        regs[1].borrow_mut().siocnt = 0x4000;
        let started = {
            let mut reg = regs[0].borrow_mut();
            let mut view = reg.view();
            nodes[0].borrow_mut().write_siocnt_multi(&mut view, 0x4080)
        };
        regs[0].borrow_mut().siocnt = started;

        assert!(run_master_to_idle(&link, &nodes, &regs, 32));
        assert!(regs[0].borrow().irq_raised(), "master raises SIO IRQ when armed");
        assert!(regs[1].borrow().irq_raised(), "slave raises SIO IRQ when armed");
    }

    #[test]
    fn s2_slave_cannot_start_transfer() {
        let (link, nodes, regs) = harness(2);
        let masked = {
            let mut reg = regs[1].borrow_mut();
            let mut view = reg.view();
            nodes[1].borrow_mut().write_siocnt_multi(&mut view, 0x0080)
        };
        assert_eq!(masked & 0x0080, 0, "a slave's start bit is silently cleared");
        assert_eq!(link.phase(), Phase::Idle, "phase stays Idle; only the master can start it");
    }

    #[test]
    fn s6_four_node_full_mesh() {
        let (link, nodes, regs) = harness(4);
        let sends = [0xA0u16, 0xB1, 0xC2, 0xD3];
        for (i, send) in sends.iter().enumerate() {
            regs[i].borrow_mut().mlt_send = *send;
        }

        {
            let mut reg = regs[0].borrow_mut();
            let mut view = reg.view();
            nodes[0].borrow_mut().write_siocnt_multi(&mut view, 0x0080);
        }

        assert!(run_master_to_idle(&link, &nodes, &regs, 64));

        for (i, r) in regs.iter().enumerate() {
            assert_eq!(r.borrow().siomulti, sends, "node {i} observes every slot's send word");
        }
    }

    #[test]
    fn compaction_holds_after_attach_detach() {
        let hub = SharedHub::new();
        let mut link = super::super::SharedLink::new(LockstepLink::new(hub.into_host()));
        let a = link.attach().unwrap();
        let b = link.attach().unwrap();
        let c = link.attach().unwrap();
        assert_eq!([a.get(), b.get(), c.get()], [0, 1, 2]);

        link.detach(&b);
        // c shifts down into b's old slot; a is untouched.
        assert_eq!(a.get(), 0);
        assert_eq!(c.get(), 1);
        assert_eq!(link.attached(), 2);
        for (i, p) in link.players.iter().enumerate() {
            assert_eq!(p.id.get(), i, "players[i].id == i must hold after compaction");
        }
    }

    #[test]
    fn attach_fails_past_max_gbas() {
        let hub = SharedHub::new();
        let mut link = super::super::SharedLink::new(LockstepLink::new(hub.into_host()));
        for _ in 0..MAX_GBAS {
            assert!(link.attach().is_some());
        }
        assert!(link.attach().is_none(), "a fifth attach must fail (spec.md §7 attach-full)");
    }

    #[test]
    fn dormant_node_reports_i32_max_with_fewer_than_two_attached() {
        let hub = SharedHub::new();
        let mut link = super::super::SharedLink::new(LockstepLink::new(hub.into_host()));
        let id = link.attach().unwrap();
        let mut node = LockstepNode::new(link.clone(), id);
        node.load(SioMode::Multi);
        let mut regs = Regs::new();
        let mut view = regs.view();
        assert_eq!(node.process_events(&mut view, 100), i32::MAX);
    }
}
