use serde::{Deserialize, Serialize};

/// Which of the three transfer modes this crate supports a SIO unit is
/// currently configured for. Chosen from SIOCNT's mode-select bits
/// whenever the register is written, same as the original's
/// `node->mode = driver->p->mode`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SioMode {
    #[default]
    None,
    Multi,
    Normal8,
    Normal32,
}

bitfield! {
    /// SIOCNT as observed in MULTI-PLAY mode.
    #[derive(Serialize, Deserialize, Default, Copy, Clone, PartialEq)]
    pub struct SiocntMulti(u16);
    impl Debug;
    u16;
    pub baud, set_baud: 1, 0;
    pub slave, set_slave: 2;
    pub ready, set_ready: 3;
    pub id, set_id: 5, 4;
    pub error, set_error: 6;
    pub busy, set_busy: 7;
    pub irq, set_irq: 14;
}

bitfield! {
    /// SIOCNT as observed in NORMAL-8/NORMAL-32 mode.
    #[derive(Serialize, Deserialize, Default, Copy, Clone, PartialEq)]
    pub struct SiocntNormal(u16);
    impl Debug;
    u16;
    pub shift_clock_internal, set_shift_clock_internal: 0;
    pub internal_shift_clock_speed, set_internal_shift_clock_speed: 1;
    pub si_state, set_si_state: 2;
    pub sd_state, set_sd_state: 3;
    pub idle_so, set_idle_so: 6;
    pub start, set_start: 7;
    pub width_32bit, set_width_32bit: 12;
    pub irq, set_irq: 14;
}

bitfield! {
    #[derive(Serialize, Deserialize, Default, Copy, Clone, PartialEq)]
    pub struct Rcnt(u16);
    impl Debug;
    u16;
    pub sc, set_sc: 0;
    pub sd, set_sd: 1;
    pub si, set_si: 2;
    pub so, set_so: 3;
    pub mode, set_mode: 15, 14;
}

/// GBA system clock, used to derive NORMAL-32's transfer length from its
/// frequency-divider bit (spec.md §4.1).
pub const CPU_HZ: i32 = 16_777_216;

/// `cyclesPerTransfer[baud][attached-1]`: how long a MULTI-PLAY transfer
/// takes once all attached nodes have latched their send word, as a
/// function of the baud rate and the number of attached players.
///
/// Derived from the documented MULTI-PLAY baud rates (9600/38400/57600/
/// 115200 bps), at 16 bits per attached node plus a fixed per-transfer
/// overhead; the manufacturer's exact lookup table was not present in the
/// retrieval corpus (see DESIGN.md).
pub const CYCLES_PER_TRANSFER: [[i32; 4]; 4] = {
    const BAUD_BPS: [i32; 4] = [9600, 38400, 57600, 115200];
    const OVERHEAD_BITS: i32 = 16;
    let mut table = [[0i32; 4]; 4];
    let mut baud = 0;
    while baud < 4 {
        let mut idx = 0;
        while idx < 4 {
            let attached = idx as i32 + 1;
            let bits = attached * 16 + OVERHEAD_BITS;
            table[baud][idx] = (CPU_HZ / BAUD_BPS[baud]) * bits;
            idx += 1;
        }
        baud += 1;
    }
    table
};

/// `CYCLES_PER_TRANSFER[baud][attached - 1]`, spelled out per spec.md §4.1.
#[inline]
pub fn cycles_per_transfer(baud: u8, attached: usize) -> i32 {
    CYCLES_PER_TRANSFER[(baud & 3) as usize][(attached.saturating_sub(1)).min(3)]
}
