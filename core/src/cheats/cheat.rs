//! The decoded cheat data model (spec.md §3): one instruction of memory
//! override, plus the bounded ROM-patch table a cheat set carries
//! alongside its cheat list.

use serde::{Deserialize, Serialize};

/// Upper bound on how many ROM patches one cheat set may hold
/// concurrently. The original reference kept this as a compile-time
/// constant (`MAX_ROM_PATCHES`) sized for typical cheat files; the
/// retrieval corpus didn't retain the exact figure, so 32 was chosen here
/// — generous for real cheat files and, not incidentally, small enough to
/// stay within `serde`'s built-in fixed-size-array support (see
/// DESIGN.md).
pub const MAX_ROM_PATCHES: usize = 32;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl Width {
    pub fn from_byte_count(n: usize) -> Option<Width> {
        match n {
            1 => Some(Width::Byte),
            2 => Some(Width::Half),
            4 => Some(Width::Word),
            _ => None,
        }
    }
}

/// A cheat's effect kind (spec.md §3: `type ∈ {ASSIGN, …}`). Only
/// `Assign` is given concrete semantics by the excerpted source (VBA-style
/// and raw-assign lines); codes decoded from the encrypted families carry
/// an opcode byte whose exact operation table wasn't part of the
/// retrieved reference material, so it round-trips as `Encoded` rather
/// than being guessed at (see DESIGN.md).
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CheatType {
    Assign,
    Encoded(u8),
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct Cheat {
    pub address: u32,
    pub operand: u32,
    pub operand_offset: u32,
    pub address_offset: u32,
    pub repeat: u32,
    pub width: Width,
    pub cheat_type: CheatType,
}

impl Cheat {
    pub fn assign(address: u32, operand: u32, width: Width) -> Cheat {
        Cheat {
            address,
            operand,
            operand_offset: 0,
            address_offset: 0,
            repeat: 1,
            width,
            cheat_type: CheatType::Assign,
        }
    }
}

/// A single reversible 16-bit ROM overwrite (spec.md §3, §4.4).
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone)]
pub struct RomPatch {
    pub address: u32,
    pub new_value: u16,
    pub old_value: u16,
    pub exists: bool,
    pub applied: bool,
}
