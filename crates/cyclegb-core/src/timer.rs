//! DIV/TIMA/TMA/TAC.
//!
//! TIMA is clocked by a falling edge on `counter bit AND TAC enable`, so a
//! write to DIV or TAC can bump TIMA the same way a normal tick does.

/// Divider value left behind by the DMG boot ROM.
pub const DIV_SEED: u16 = 0xABCC;

const TIMER_INTERRUPT: u8 = 0x04;

/// Cycles TIMA stays at zero after an overflow, minus the reload cycle.
const RELOAD_DELAY: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Overflow {
    Idle,
    /// TIMA overflowed and reads 0 until `delay` runs out.
    Pending { value: u8, delay: u8 },
    /// TMA was copied into TIMA during the current cycle.
    Reloading,
}

#[derive(Clone, Debug)]
pub struct Timer {
    /// Free running 16-bit counter. DIV is the upper byte.
    pub counter: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    last_signal: bool,
    /// TMA before a write landed this cycle; an overflow on the same cycle
    /// reloads the old value.
    tma_latch: Option<u8>,
    overflow: Overflow,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            counter: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            tma_latch: None,
            overflow: Overflow::Idle,
        }
    }

    /// Power-on state: registers cleared, counter at the boot ROM's exit value.
    pub fn reset(&mut self) {
        *self = Self::new();
        self.counter = DIV_SEED;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.counter >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF04 => self.reset_div(if_reg),
            0xFF05 => match self.overflow {
                Overflow::Reloading | Overflow::Pending { delay: 0, .. } => {}
                Overflow::Pending { .. } => {
                    self.tima = val;
                    self.overflow = Overflow::Idle;
                }
                Overflow::Idle => self.tima = val,
            },
            0xFF06 => {
                self.tma_latch = Some(self.tma);
                self.tma = val;
                match &mut self.overflow {
                    Overflow::Pending { value, .. } => *value = val,
                    Overflow::Reloading => self.tima = val,
                    Overflow::Idle => {}
                }
            }
            0xFF07 => {
                let prev = signal(self.counter, self.tac);
                self.tac = val & 0x07;
                self.edge(prev);
            }
            _ => {}
        }
    }

    /// Advance by `cycles`, one cycle at a time, raising IF bit 2 when a
    /// delayed reload lands.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        for _ in 0..cycles {
            self.tick_reload(if_reg);
            let prev = self.last_signal;
            self.counter = self.counter.wrapping_add(1);
            self.edge(prev);
        }
    }

    /// DIV write: zero the counter. Counts as a cycle for the reload delay
    /// and may produce a falling edge.
    pub fn reset_div(&mut self, if_reg: &mut u8) {
        self.tick_reload(if_reg);
        let prev = signal(self.counter, self.tac);
        self.counter = 0;
        self.edge(prev);
    }

    fn tick_reload(&mut self, if_reg: &mut u8) {
        match self.overflow {
            Overflow::Reloading => self.overflow = Overflow::Idle,
            Overflow::Pending { value, delay: 0 } => {
                self.tima = value;
                *if_reg |= TIMER_INTERRUPT;
                self.overflow = Overflow::Reloading;
            }
            Overflow::Pending { value, delay } => {
                self.overflow = Overflow::Pending {
                    value,
                    delay: delay - 1,
                };
            }
            Overflow::Idle => {}
        }
    }

    fn edge(&mut self, prev: bool) {
        let tma_old = self.tma_latch.take();
        let now = signal(self.counter, self.tac);
        if prev && !now {
            self.increment(tma_old);
        }
        self.last_signal = now;
    }

    fn increment(&mut self, tma_old: Option<u8>) {
        match self.tima.checked_add(1) {
            Some(v) => self.tima = v,
            None => {
                self.tima = 0;
                self.overflow = Overflow::Pending {
                    value: tma_old.unwrap_or(self.tma),
                    delay: RELOAD_DELAY,
                };
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter bit watched for the given TAC clock select.
#[inline]
fn selected_bit(tac: u8) -> u32 {
    match tac & 0x03 {
        0x00 => 9,
        0x01 => 3,
        0x02 => 5,
        _ => 7,
    }
}

#[inline]
fn signal(counter: u16, tac: u8) -> bool {
    tac & 0x04 != 0 && (counter >> selected_bit(tac)) & 1 != 0
}
