//! Cheat sets and the cheat device that owns them (spec.md §3, §4.4).

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::util::Shared;

use super::cheat::{Cheat, RomPatch, MAX_ROM_PATCHES};
use crate::bus::Addr;

/// Which encrypted family (if any) a set has locked onto, replacing the
/// original's raw `gsaVersion ∈ {0..4}` integer with a sum type carrying
/// only the states that matter to this crate (spec.md §9, "variant-tagged
/// cheat set").
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum GsaVariant {
    #[default]
    Autodetect,
    GameSharkV1,
    GameSharkV2,
    ProActionReplayV3,
    ProActionReplayV4,
}

impl GsaVariant {
    /// The directive token this variant dumps to (spec.md §4.4, Testable
    /// Property 5), or `None` for the variants that emit nothing.
    pub fn directive(self) -> Option<&'static str> {
        match self {
            GsaVariant::GameSharkV1 | GsaVariant::GameSharkV2 => Some("GSAv1"),
            GsaVariant::ProActionReplayV3 | GsaVariant::ProActionReplayV4 => Some("PARv3"),
            GsaVariant::Autodetect => None,
        }
    }

    fn from_directive(directive: &str) -> Option<GsaVariant> {
        match directive {
            "GSAv1" => Some(GsaVariant::GameSharkV1),
            "PARv3" => Some(GsaVariant::ProActionReplayV3),
            _ => None,
        }
    }
}

/// A future debugger's entry points for installing/removing the
/// memory-watch breakpoint a cheat set needs to intercept RAM writes.
/// Left with empty default bodies: spec.md §9 Open Question (a) notes the
/// reference source's install/remove bodies were themselves empty
/// (`// TODO: Put back hooks`), pending a concrete debugger integration
/// this crate doesn't have yet.
pub trait BreakpointHook {
    fn install(&mut self) {}
    fn remove(&mut self) {}
}

#[derive(Default)]
pub struct NullBreakpointHook;
impl BreakpointHook for NullBreakpointHook {}

/// Reference-counted via ordinary `Rc` sharing (spec.md §9: "represent as
/// shared ownership with a release action"); `reentries` is a *separate*
/// concept from the `Rc` strong count — it counts how many attached
/// cheat sets currently want the hook installed, not how many sets
/// reference the struct.
pub struct Hook {
    reentries: u32,
    driver: Box<dyn BreakpointHook>,
}

impl Hook {
    pub fn new(driver: Box<dyn BreakpointHook>) -> Hook {
        Hook {
            reentries: 0,
            driver,
        }
    }
}

pub type SharedHook = Shared<Hook>;

fn add_breakpoint(hook: &mut SharedHook) {
    hook.reentries += 1;
    if hook.reentries > 1 {
        return;
    }
    hook.driver.install();
}

fn remove_breakpoint(hook: &mut SharedHook) {
    hook.reentries -= 1;
    if hook.reentries > 0 {
        return;
    }
    hook.driver.remove();
}

/// A collection of decoded cheats plus ROM patches (spec.md §3-§4.4).
#[derive(Serialize, Deserialize)]
pub struct CheatSet {
    pub name: String,
    pub cheats: Vec<Cheat>,
    pub rom_patches: [RomPatch; MAX_ROM_PATCHES],
    pub gsa_variant: GsaVariant,
    pub gsa_seeds: [u32; 2],
    pub cb_rng_state: u16,
    pub cb_master: u16,
    #[serde(skip)]
    pub hook: Option<SharedHook>,
}

impl CheatSet {
    pub fn new(name: &str) -> CheatSet {
        CheatSet {
            name: name.to_string(),
            cheats: Vec::new(),
            rom_patches: [RomPatch::default(); MAX_ROM_PATCHES],
            gsa_variant: GsaVariant::Autodetect,
            gsa_seeds: [0, 0],
            cb_rng_state: super::codebreaker::INITIAL_RNG_STATE,
            cb_master: super::codebreaker::INITIAL_MASTER,
            hook: None,
        }
    }

    /// Locks this set to a known GameShark/PAR variant and remembers its
    /// seed table, so subsequent lines decrypt directly instead of
    /// re-running autodetection (spec.md §4.5).
    pub fn set_gsa_variant(&mut self, variant: GsaVariant, seeds: [u32; 2]) {
        self.gsa_variant = variant;
        self.gsa_seeds = seeds;
    }

    /// Inserts a ROM patch into the first free slot; fails silently if
    /// the table is full (spec.md §7, "capacity").
    pub fn add_rom_patch(&mut self, address: Addr, new_value: u16) -> bool {
        if let Some(slot) = self.rom_patches.iter_mut().find(|p| !p.exists) {
            slot.address = address;
            slot.new_value = new_value;
            slot.old_value = 0;
            slot.exists = true;
            slot.applied = false;
            true
        } else {
            debug!("cheats: ROM patch table full, dropping patch at {:#010x}", address);
            false
        }
    }

    /// `copyProperties` (spec.md §4.4): transfers version/seed/rolling
    /// state onto a freshly created replacement set, re-referencing the
    /// shared hook.
    pub fn copy_properties_from(&mut self, other: &CheatSet) {
        self.gsa_variant = other.gsa_variant;
        self.gsa_seeds = other.gsa_seeds;
        self.cb_rng_state = other.cb_rng_state;
        self.cb_master = other.cb_master;
        self.hook = other.hook.clone();
    }

    /// `parseDirectives` (spec.md §4.4): unknown directives are ignored.
    pub fn parse_directives(&mut self, directives: &[String]) {
        for directive in directives {
            if let Some(variant) = GsaVariant::from_directive(directive) {
                self.gsa_variant = variant;
            }
        }
    }

    /// `dumpDirectives` (spec.md §4.4, Testable Property 5): replaces the
    /// caller's list wholesale.
    pub fn dump_directives(&self) -> Vec<String> {
        self.gsa_variant
            .directive()
            .map(|d| vec![d.to_string()])
            .unwrap_or_default()
    }
}

/// Any memory the cheat engine can overwrite a 16-bit half-word in. Kept
/// as a trait (rather than depending directly on `SysBus`) so the device
/// can be unit tested against a plain byte buffer.
pub trait MemoryPatcher {
    fn patch16(&mut self, address: Addr, new_value: u16) -> u16;
}

fn apply_rom_patches(set: &mut CheatSet, bus: &mut dyn MemoryPatcher) {
    for patch in set.rom_patches.iter_mut() {
        if !patch.exists || patch.applied {
            continue;
        }
        patch.old_value = bus.patch16(patch.address, patch.new_value);
        patch.applied = true;
    }
}

fn unapply_rom_patches(set: &mut CheatSet, bus: &mut dyn MemoryPatcher) {
    for patch in set.rom_patches.iter_mut() {
        if !patch.exists || !patch.applied {
            continue;
        }
        bus.patch16(patch.address, patch.old_value);
        patch.applied = false;
    }
}

/// Owns every cheat set attached to one emulated machine (spec.md §3,
/// §4.4).
#[derive(Default, Serialize, Deserialize)]
pub struct CheatDevice {
    pub sets: Vec<CheatSet>,
}

impl CheatDevice {
    pub fn new() -> CheatDevice {
        CheatDevice { sets: Vec::new() }
    }

    pub fn create_set(&mut self, name: &str) -> usize {
        self.sets.push(CheatSet::new(name));
        self.sets.len() - 1
    }

    /// Installs the breakpoint hook (reentry-counted) and applies
    /// whatever ROM patches the set has accumulated.
    pub fn add_set(&mut self, index: usize, bus: &mut dyn MemoryPatcher) {
        let set = &mut self.sets[index];
        if let Some(hook) = set.hook.as_mut() {
            add_breakpoint(hook);
        }
        apply_rom_patches(set, bus);
        trace!("cheats: attached set '{}'", set.name);
    }

    /// Symmetric to [`CheatDevice::add_set`]: unapplies patches first,
    /// then releases the hook (spec.md §4.4).
    pub fn remove_set(&mut self, index: usize, bus: &mut dyn MemoryPatcher) {
        let set = &mut self.sets[index];
        unapply_rom_patches(set, bus);
        if let Some(hook) = set.hook.as_mut() {
            remove_breakpoint(hook);
        }
        trace!("cheats: detached set '{}'", set.name);
    }

    pub fn refresh(&mut self, index: usize, bus: &mut dyn MemoryPatcher) {
        apply_rom_patches(&mut self.sets[index], bus);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeBus {
        mem: std::collections::HashMap<Addr, u16>,
    }

    impl MemoryPatcher for FakeBus {
        fn patch16(&mut self, address: Addr, new_value: u16) -> u16 {
            self.mem.insert(address, new_value).unwrap_or(0)
        }
    }

    #[test]
    fn rom_patch_symmetry_on_attach_detach() {
        let mut device = CheatDevice::new();
        let idx = device.create_set("test");
        device.sets[idx].add_rom_patch(0x0800_0010, 0xBEEF);
        let mut bus = FakeBus {
            mem: std::collections::HashMap::new(),
        };
        bus.mem.insert(0x0800_0010, 0x1234);

        device.add_set(idx, &mut bus);
        assert_eq!(bus.mem[&0x0800_0010], 0xBEEF);

        device.remove_set(idx, &mut bus);
        assert_eq!(bus.mem[&0x0800_0010], 0x1234);
    }

    #[test]
    fn rom_patch_table_rejects_beyond_capacity() {
        let mut set = CheatSet::new("full");
        for i in 0..MAX_ROM_PATCHES {
            assert!(set.add_rom_patch(0x0800_0000 + i as u32 * 2, 0));
        }
        assert!(!set.add_rom_patch(0x0900_0000, 0));
    }

    #[test]
    fn directive_round_trip() {
        let mut set = CheatSet::new("d");
        set.gsa_variant = GsaVariant::GameSharkV2;
        assert_eq!(set.dump_directives(), vec!["GSAv1".to_string()]);

        let mut fresh = CheatSet::new("d2");
        fresh.parse_directives(&["GSAv1".to_string()]);
        assert_eq!(fresh.gsa_variant, GsaVariant::GameSharkV1);

        let mut ignored = CheatSet::new("d3");
        ignored.parse_directives(&["Unknown".to_string()]);
        assert_eq!(ignored.gsa_variant, GsaVariant::Autodetect);
        assert!(ignored.dump_directives().is_empty());
    }
}
