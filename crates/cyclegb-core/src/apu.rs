//! Sound register block at 0xFF10..=0xFF26.
//!
//! No samples are produced. [`SoundRegisters`] only keeps what games write so
//! that read-backs and the NR52 power switch behave.

const NR52: u16 = 0xFF26;
const REG_BASE: u16 = 0xFF10;
const REG_COUNT: usize = 0x17;

/// What the memory bus needs from an audio implementation.
pub trait AudioUnit {
    fn step(&mut self, cycles: u32);
    fn read_reg(&self, addr: u16) -> u8;
    fn write_reg(&mut self, addr: u16, val: u8);
    fn reset(&mut self) {}
}

#[derive(Clone, Debug)]
pub struct SoundRegisters {
    regs: [u8; REG_COUNT],
}

impl SoundRegisters {
    pub fn new() -> Self {
        let mut regs = [0; REG_COUNT];
        regs[(NR52 - REG_BASE) as usize] = 0x80;
        Self { regs }
    }

    fn powered(&self) -> bool {
        self.regs[(NR52 - REG_BASE) as usize] & 0x80 != 0
    }

    /// Bits that always read back as 1 on DMG.
    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF13 | 0xFF18 | 0xFF1B | 0xFF1D | 0xFF20 => 0xFF,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF15 | 0xFF1F => 0xFF,
            NR52 => 0x70,
            _ => 0x00,
        }
    }
}

impl Default for SoundRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for SoundRegisters {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn step(&mut self, _cycles: u32) {}

    fn read_reg(&self, addr: u16) -> u8 {
        match addr.checked_sub(REG_BASE).map(usize::from) {
            Some(idx) if idx < REG_COUNT => self.regs[idx] | Self::read_mask(addr),
            _ => 0xFF,
        }
    }

    fn write_reg(&mut self, addr: u16, val: u8) {
        let Some(idx) = addr.checked_sub(REG_BASE).map(usize::from) else {
            return;
        };
        if idx >= REG_COUNT {
            return;
        }
        if addr == NR52 {
            if val & 0x80 == 0 {
                self.regs.fill(0);
            } else {
                self.regs[idx] = 0x80;
            }
            return;
        }
        if self.powered() {
            self.regs[idx] = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_read_back_with_unused_bits_set() {
        let mut apu = SoundRegisters::new();
        apu.write_reg(0xFF12, 0xF3);
        assert_eq!(apu.read_reg(0xFF12), 0xF3);
        apu.write_reg(0xFF11, 0x80);
        assert_eq!(apu.read_reg(0xFF11), 0xBF);
        assert_eq!(apu.read_reg(0xFF26), 0xF0);
    }

    #[test]
    fn power_off_clears_and_blocks_writes() {
        let mut apu = SoundRegisters::new();
        apu.write_reg(0xFF24, 0x77);
        apu.write_reg(0xFF26, 0x00);
        assert_eq!(apu.read_reg(0xFF24), 0x00);
        apu.write_reg(0xFF24, 0x77);
        assert_eq!(apu.read_reg(0xFF24), 0x00);
        assert_eq!(apu.read_reg(0xFF26), 0x70);

        apu.write_reg(0xFF26, 0x80);
        apu.write_reg(0xFF24, 0x77);
        assert_eq!(apu.read_reg(0xFF24), 0x77);
    }
}
