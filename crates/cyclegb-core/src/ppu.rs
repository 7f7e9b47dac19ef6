//! LCD register block.
//!
//! Pixel output is not emulated. [`LcdRegisters`] keeps the registers at
//! 0xFF40..=0xFF4B and walks LY through the 154-line frame so that games
//! waiting on VBlank or LY make progress.

const LINE_CYCLES: u32 = 456;
const VISIBLE_LINES: u8 = 144;
const TOTAL_LINES: u8 = 154;

// Mode boundaries within a visible line, in T-cycles.
const OAM_SCAN_END: u32 = 80;
const TRANSFER_END: u32 = 80 + 172;

const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM: u8 = 2;
const MODE_TRANSFER: u8 = 3;

const VBLANK_INTERRUPT: u8 = 0x01;
const STAT_INTERRUPT: u8 = 0x02;

/// LCDC after the DMG boot ROM.
pub const LCDC_BOOT: u8 = 0x91;

/// What the memory bus needs from a video implementation.
pub trait VideoUnit {
    /// Advance by `cycles` T-cycles, setting bits in `if_reg` as needed.
    fn step(&mut self, cycles: u32, if_reg: &mut u8);
    fn read_reg(&self, addr: u16) -> u8;
    fn write_reg(&mut self, addr: u16, val: u8);
    /// Return to power-on state.
    fn reset(&mut self) {}
}

#[derive(Clone, Debug)]
pub struct LcdRegisters {
    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,
    line_clock: u32,
    stat_line: bool,
}

impl LcdRegisters {
    pub fn new() -> Self {
        Self {
            lcdc: LCDC_BOOT,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0xFF,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0,
            wx: 0,
            line_clock: 0,
            stat_line: false,
        }
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    fn enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    fn mode(&self) -> u8 {
        if !self.enabled() {
            MODE_HBLANK
        } else if self.ly >= VISIBLE_LINES {
            MODE_VBLANK
        } else if self.line_clock < OAM_SCAN_END {
            MODE_OAM
        } else if self.line_clock < TRANSFER_END {
            MODE_TRANSFER
        } else {
            MODE_HBLANK
        }
    }

    fn coincidence(&self) -> bool {
        self.enabled() && self.ly == self.lyc
    }

    /// STAT interrupt fires on a rising edge of the OR of enabled sources.
    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let mode_signal = match self.mode() {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        let line = mode_signal || (self.coincidence() && self.stat & 0x40 != 0);
        if line && !self.stat_line {
            *if_reg |= STAT_INTERRUPT;
        }
        self.stat_line = line;
    }
}

impl Default for LcdRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoUnit for LcdRegisters {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        if !self.enabled() {
            return;
        }
        let mut remaining = cycles;
        while remaining > 0 {
            let increment = remaining.min(4);
            remaining -= increment;
            self.line_clock += increment;
            if self.line_clock >= LINE_CYCLES {
                self.line_clock -= LINE_CYCLES;
                self.ly = (self.ly + 1) % TOTAL_LINES;
                if self.ly == VISIBLE_LINES {
                    *if_reg |= VBLANK_INTERRUPT;
                }
            }
            self.update_stat_irq(if_reg);
        }
    }

    fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                0x80 | (self.stat & 0x78)
                    | self.mode()
                    | if self.coincidence() { 0x04 } else { 0 }
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.enabled();
                self.lcdc = val;
                if was_on && !self.enabled() {
                    self.ly = 0;
                    self.line_clock = 0;
                    self.stat_line = false;
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ly_advances_once_per_line() {
        let mut lcd = LcdRegisters::new();
        let mut if_reg = 0;
        lcd.step(LINE_CYCLES - 4, &mut if_reg);
        assert_eq!(lcd.read_reg(0xFF44), 0);
        lcd.step(4, &mut if_reg);
        assert_eq!(lcd.read_reg(0xFF44), 1);
    }

    #[test]
    fn vblank_requested_at_line_144() {
        let mut lcd = LcdRegisters::new();
        let mut if_reg = 0;
        lcd.step(LINE_CYCLES * 143, &mut if_reg);
        assert_eq!(if_reg & VBLANK_INTERRUPT, 0);
        lcd.step(LINE_CYCLES, &mut if_reg);
        assert_eq!(if_reg & VBLANK_INTERRUPT, VBLANK_INTERRUPT);
        assert_eq!(lcd.read_reg(0xFF41) & 0x03, MODE_VBLANK);

        lcd.step(LINE_CYCLES * 10, &mut if_reg);
        assert_eq!(lcd.ly(), 0);
    }

    #[test]
    fn lyc_match_raises_stat_when_enabled() {
        let mut lcd = LcdRegisters::new();
        let mut if_reg = 0;
        lcd.write_reg(0xFF45, 2);
        lcd.write_reg(0xFF41, 0x40);
        lcd.step(LINE_CYCLES, &mut if_reg);
        assert_eq!(if_reg & STAT_INTERRUPT, 0);
        lcd.step(LINE_CYCLES, &mut if_reg);
        assert_eq!(if_reg & STAT_INTERRUPT, STAT_INTERRUPT);
        assert_eq!(lcd.read_reg(0xFF41) & 0x04, 0x04);
    }

    #[test]
    fn lcd_off_holds_ly_at_zero() {
        let mut lcd = LcdRegisters::new();
        let mut if_reg = 0;
        lcd.step(LINE_CYCLES * 3, &mut if_reg);
        lcd.write_reg(0xFF40, 0x11);
        lcd.step(LINE_CYCLES * 3, &mut if_reg);
        assert_eq!(lcd.ly(), 0);
        assert_eq!(lcd.read_reg(0xFF41) & 0x03, MODE_HBLANK);
    }
}
