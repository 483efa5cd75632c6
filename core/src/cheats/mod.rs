//! The cheat engine: decoded codes, ROM patches, and the device that
//! attaches a set of them to a running machine (spec.md §3-§7).

pub mod cheat;
pub mod codebreaker;
pub mod device;
pub mod gameshark;
pub mod parser;

pub use cheat::{Cheat, CheatType, RomPatch, Width, MAX_ROM_PATCHES};
pub use device::{BreakpointHook, CheatDevice, CheatSet, GsaVariant, Hook, MemoryPatcher, SharedHook};
pub use parser::{add_line, add_vba_line, LineFormat};
