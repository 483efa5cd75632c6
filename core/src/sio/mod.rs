//! Serial I/O: the GBA's link-cable port. Implements enough of SIOCNT /
//! RCNT / SIOMULTIn / SIODATAn to drive deterministic MULTI-PLAY and
//! NORMAL-mode lockstep transfers between emulated consoles (spec.md
//! §1-§7); everything else about the port (JOY BUS / infrared / UART
//! passthrough) is a non-goal.

pub mod hub;
pub mod lockstep;
pub mod regs;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::interrupt::{InterruptConnect, SharedInterruptFlags};
use crate::sched::{EventType, SchedulerConnect, SharedScheduler};
use crate::util::Shared;

use lockstep::{LockstepHost, LockstepLink, LockstepNode, SioView, SlotId};
pub use lockstep::Phase;
use regs::{Rcnt, SioMode};

/// Shared handle to the rendezvous object a group of lockstep nodes agree
/// on. `Shared<T>` is this crate's single-threaded `Rc<UnsafeCell<T>>`
/// wrapper (see `util.rs`) — the same ownership model the rest of the
/// hardware graph (`Gpu`, `SoundController`, ...) already uses internally.
pub type SharedLink = Shared<LockstepLink>;

/// A capability set any serial port backend must implement (spec.md §9,
/// "polymorphic driver via function-pointer table" redesigned as a trait
/// rather than a struct of raw fn pointers).
pub trait SioDriver {
    fn init(&mut self) {}
    fn deinit(&mut self) {}
    fn load(&mut self, _mode: SioMode) {}
    fn unload(&mut self) {}
    /// Returns the value that should actually be latched into SIOCNT,
    /// after the driver has had a chance to veto or mask bits (the way
    /// `GBASIOLockstepNodeMultiWriteRegister`/`NormalWriteRegister` do).
    fn write_siocnt(&mut self, view: &mut SioView, value: u16, mode: SioMode) -> u16;
    /// Advance this node by `cycles`; returns the cycle count until the
    /// next time it must be invoked again (`i32::MAX` when dormant).
    fn process_events(&mut self, view: &mut SioView, cycles: i32) -> i32;
}

/// No link plugged in: SIOCNT writes pass through unmasked and the port
/// never has anything to do. Mirrors the teacher's fallback behavior for
/// other not-yet-wired registers in `iodev.rs`.
#[derive(Default)]
pub struct NullSioDriver;

impl SioDriver for NullSioDriver {
    fn write_siocnt(&mut self, _view: &mut SioView, value: u16, _mode: SioMode) -> u16 {
        value
    }

    fn process_events(&mut self, _view: &mut SioView, _cycles: i32) -> i32 {
        i32::MAX
    }
}

impl SioDriver for LockstepNode {
    fn load(&mut self, mode: SioMode) {
        LockstepNode::load(self, mode)
    }

    fn unload(&mut self) {
        LockstepNode::unload(self)
    }

    fn write_siocnt(&mut self, view: &mut SioView, value: u16, mode: SioMode) -> u16 {
        match mode {
            SioMode::Multi => self.write_siocnt_multi(view, value),
            SioMode::Normal8 | SioMode::Normal32 => self.write_siocnt_normal(value),
            SioMode::None => value,
        }
    }

    fn process_events(&mut self, view: &mut SioView, cycles: i32) -> i32 {
        LockstepNode::process_events(self, view, cycles)
    }
}

/// The register-owning half of the port, analogous to how `Gpu`/
/// `SoundController`/`Timers` each own their own registers plus a cloned
/// [`SharedScheduler`] handle to self-reschedule with.
#[derive(Serialize, Deserialize)]
pub struct SioController {
    siocnt: u16,
    rcnt: u16,
    siomulti: [u16; 4],
    mlt_send: u16,
    siodata8: u16,
    siodata32: u32,
    mode: SioMode,

    scheduler: SharedScheduler,
    interrupt_flags: SharedInterruptFlags,

    #[serde(skip)]
    #[serde(default = "default_driver")]
    driver: Box<dyn SioDriver>,
}

fn default_driver() -> Box<dyn SioDriver> {
    Box::new(NullSioDriver)
}

/// `driver` can't be cloned generically (it's a `Box<dyn SioDriver>`), so a
/// clone comes back with no driver attached, mirroring what deserializing a
/// save state already does via `#[serde(default = "default_driver")]`. A
/// cloned `IoDevices` snapshot (taken for save-state serialization) never
/// needs its SIO driver object to survive the copy.
impl Clone for SioController {
    fn clone(&self) -> SioController {
        SioController {
            siocnt: self.siocnt,
            rcnt: self.rcnt,
            siomulti: self.siomulti,
            mlt_send: self.mlt_send,
            siodata8: self.siodata8,
            siodata32: self.siodata32,
            mode: self.mode,
            scheduler: self.scheduler.clone(),
            interrupt_flags: self.interrupt_flags.clone(),
            driver: default_driver(),
        }
    }
}

impl SioController {
    pub fn new(scheduler: SharedScheduler, interrupt_flags: SharedInterruptFlags) -> SioController {
        SioController {
            siocnt: 0,
            rcnt: 0,
            siomulti: [0xFFFF; 4],
            mlt_send: 0,
            siodata8: 0,
            siodata32: 0,
            mode: SioMode::None,
            scheduler,
            interrupt_flags,
            driver: default_driver(),
        }
    }

    /// Plugs a lockstep node attached to `link` into this port, replacing
    /// whatever driver (if any) was previously installed.
    pub fn attach_lockstep(&mut self, link: &SharedLink, id: SlotId) {
        self.driver.deinit();
        let mut node = LockstepNode::new(link.clone(), id);
        node.init();
        self.driver = Box::new(node);
        self.schedule_next(0);
    }

    pub fn detach(&mut self) {
        self.driver.unload();
        self.driver.deinit();
        self.driver = default_driver();
    }

    /// Mode select: RCNT bit 15 set takes SIO out of SIOCNT's hands
    /// entirely (General-Purpose when bit 14 is clear, JOY BUS when set;
    /// neither is modeled here). Otherwise SIOCNT bits 13-12 pick one of
    /// the four SIO modes — `00`=NORMAL-8, `01`=NORMAL-32, `10`=MULTI,
    /// `11`=UART (not modeled) — so NORMAL-8 and NORMAL-32 are two
    /// distinct values of the *same* 2-bit field rather than a separate
    /// gate-plus-width-bit pair.
    fn mode_from_siocnt(&self) -> SioMode {
        if Rcnt(self.rcnt).mode() & 0b10 != 0 {
            return SioMode::None;
        }
        match (self.siocnt >> 12) & 0b11 {
            0b00 => SioMode::Normal8,
            0b01 => SioMode::Normal32,
            0b10 => SioMode::Multi,
            _ => SioMode::None,
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

    fn schedule_next(&mut self, cycles: i32) {
        self.scheduler
            .push(EventType::Sio, cycles.max(0) as usize);
    }

    pub fn mode(&self) -> SioMode {
        self.mode
    }

    pub fn read_siocnt(&self) -> u16 {
        self.siocnt
    }

    pub fn read_rcnt(&self) -> u16 {
        self.rcnt
    }

    /// `REG_SIOMULTI0`/`REG_SIOMULTI1` double as the low/high halves of
    /// `REG_SIODATA32` in NORMAL-32 mode (they're the same hardware
    /// addresses; spec.md §6). Only MULTI mode exposes `siomulti[2..4]`
    /// (there's no 3rd/4th child in NORMAL mode, so those reads fall back
    /// to whatever MULTI slots last held).
    pub fn read_siomulti(&self, index: usize) -> u16 {
        match (self.mode, index) {
            (SioMode::Normal32, 0) => self.read_siodata32_lo(),
            (SioMode::Normal32, 1) => self.read_siodata32_hi(),
            _ => self.siomulti[index],
        }
    }

    pub fn read_siodata8(&self) -> u16 {
        self.siodata8
    }

    pub fn read_siodata32_lo(&self) -> u16 {
        self.siodata32 as u16
    }

    pub fn read_siodata32_hi(&self) -> u16 {
        (self.siodata32 >> 16) as u16
    }

    pub fn write_rcnt(&mut self, value: u16) {
        self.rcnt = value;
        let mode = self.mode_from_siocnt();
        if mode != self.mode {
            debug!("sio: mode changed {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.driver.load(mode);
        }
    }

    pub fn write_siocnt(&mut self, value: u16) {
        let mode = self.mode_from_siocnt();
        if mode != self.mode {
            debug!("sio: mode changed {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.driver.load(mode);
        }
        let mut view = self.view();
        let masked = self.driver.write_siocnt(&mut view, value, mode);
        trace!("sio: SIOCNT write {:#06x} -> {:#06x}", value, masked);
        self.siocnt = masked;
        if masked & 0x0080 != 0 {
            self.schedule_next(0);
        }
    }

    pub fn write_mlt_send(&mut self, value: u16) {
        self.mlt_send = value;
    }

    pub fn write_siodata8(&mut self, value: u16) {
        self.siodata8 = value;
    }

    pub fn write_siodata32_lo(&mut self, value: u16) {
        self.siodata32 = (self.siodata32 & 0xFFFF_0000) | value as u32;
    }

    pub fn write_siodata32_hi(&mut self, value: u16) {
        self.siodata32 = (self.siodata32 & 0x0000_FFFF) | ((value as u32) << 16);
    }

    /// Called from `gba.rs::handle_events` on `EventType::Sio`. Reschedules
    /// itself for however many cycles until this node must run again, same
    /// contract as `GBASIOLockstepNodeProcessEvents` and the same
    /// self-rescheduling convention `Gpu::on_event`/`SoundController::on_event`
    /// use.
    pub fn on_event(&mut self, late: usize) {
        let mut view = self.view();
        let next = self.driver.process_events(&mut view, late as i32);
        self.schedule_next(next.max(1));
    }
}

impl InterruptConnect for SioController {
    fn connect_irq(&mut self, interrupt_flags: SharedInterruptFlags) {
        self.interrupt_flags = interrupt_flags;
    }
}

impl SchedulerConnect for SioController {
    fn connect_scheduler(&mut self, scheduler: SharedScheduler) {
        self.scheduler = scheduler;
    }
}

/// Helper for tests and embedders that want a ready-to-drive single-group
/// lockstep link without hand-writing a [`LockstepHost`].
pub fn new_link(host: Box<dyn LockstepHost>) -> SharedLink {
    SharedLink::new(LockstepLink::new(host))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interrupt::IrqBitmask;
    use crate::sched::Scheduler;
    use std::cell::Cell;
    use std::rc::Rc;

    fn controller() -> SioController {
        SioController::new(Scheduler::new_shared(), Rc::new(Cell::new(IrqBitmask::default())))
    }

    #[test]
    fn normal_8_and_normal_32_are_both_reachable() {
        let mut io = controller();
        io.write_siocnt(0x0000); // bits 13-12 = 00
        assert_eq!(io.mode(), SioMode::Normal8);

        let mut io = controller();
        io.write_siocnt(0x1000); // bits 13-12 = 01
        assert_eq!(io.mode(), SioMode::Normal32);

        let mut io = controller();
        io.write_siocnt(0x2000); // bits 13-12 = 10
        assert_eq!(io.mode(), SioMode::Multi);
    }

    #[test]
    fn rcnt_general_purpose_and_joy_bus_both_override_siocnt() {
        let mut io = controller();
        io.write_rcnt(0x8000); // bit 15 set, bit 14 clear: general-purpose
        io.write_siocnt(0x2000); // would otherwise select Multi
        assert_eq!(io.mode(), SioMode::None);

        let mut io = controller();
        io.write_rcnt(0xC000); // bits 15-14 set: JOY BUS
        io.write_siocnt(0x2000);
        assert_eq!(io.mode(), SioMode::None);
    }
}
