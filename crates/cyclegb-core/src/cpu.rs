//! LR35902 interpreter.
//!
//! Opcodes are decoded from their bit fields (`x = op >> 6`, `y`, `z`, and
//! `p`/`q` from `y`) rather than a 256-entry table. Every memory access goes
//! through [`Mmu::get`]/[`Mmu::set`], which charge cycles as they happen;
//! internal delays are charged with [`Mmu::update`].

use log::trace;
use thiserror::Error;

use crate::{
    breakpoints::Breakpoints,
    mmu::{Mmu, Width},
    registers::{Flag, Reg8, Reg16, Registers},
};

// Interrupt vectors (gbdev.io/pandocs/Interrupts.html)
const INTERRUPT_VBLANK: u16 = 0x40;
const INTERRUPT_STAT: u16 = 0x48;
const INTERRUPT_TIMER: u16 = 0x50;
const INTERRUPT_SERIAL: u16 = 0x58;
const INTERRUPT_JOYPAD: u16 = 0x60;

/// One machine cycle.
const M_CYCLE: u32 = 4;

/// Cycles in one 60 Hz frame.
pub const CYCLES_PER_FRAME: u64 = (crate::CPU_FREQUENCY / 60) as u64;

/// Operand order for the `z`/`y` register fields. Index 6 is `(HL)`.
const R8: [Reg8; 8] = [
    Reg8::B,
    Reg8::C,
    Reg8::D,
    Reg8::E,
    Reg8::H,
    Reg8::L,
    Reg8::F,
    Reg8::A,
];
const OPERAND_HL: u8 = 6;

const RP: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
const RP2: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::AF];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("unknown opcode {opcode:02X} at {addr:04X}")]
    UnknownOpcode { opcode: u8, addr: u16 },
}

/// How a call to [`Cpu::run_frame`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full frame's worth of cycles ran.
    Complete,
    /// Execution stopped with PC on an enabled breakpoint.
    Breakpoint(u16),
    /// Still paused at this breakpoint; nothing ran.
    Paused(u16),
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    /// Cycles charged by every `step` since reset.
    pub cycles: u64,
    /// Counts down to IME being set after EI.
    ime_enable_delay: u8,
    /// Cycles already run toward the current frame.
    frame_cycles: u64,
    /// Run the instruction at PC even if it is a breakpoint.
    skip_breakpoint: bool,
}

impl Cpu {
    /// CPU in the state the DMG boot ROM leaves behind.
    pub fn new() -> Self {
        Self {
            regs: Registers::post_boot(),
            ime: false,
            halted: false,
            cycles: 0,
            ime_enable_delay: 0,
            frame_cycles: 0,
            skip_breakpoint: false,
        }
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.regs.get16(Reg16::AF),
            self.regs.get16(Reg16::BC),
            self.regs.get16(Reg16::DE),
            self.regs.get16(Reg16::HL),
            self.regs.pc,
            self.regs.sp,
            self.cycles
        )
    }

    fn next_interrupt(pending: u8) -> (u8, u16) {
        if pending & 0x01 != 0 {
            (0x01, INTERRUPT_VBLANK)
        } else if pending & 0x02 != 0 {
            (0x02, INTERRUPT_STAT)
        } else if pending & 0x04 != 0 {
            (0x04, INTERRUPT_TIMER)
        } else if pending & 0x08 != 0 {
            (0x08, INTERRUPT_SERIAL)
        } else {
            (0x10, INTERRUPT_JOYPAD)
        }
    }

    #[inline]
    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.get(self.regs.pc, Width::Byte) as u8;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    #[inline]
    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let val = mmu.get(self.regs.pc, Width::Word);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        val
    }

    #[inline]
    fn read8(mmu: &mut Mmu, addr: u16) -> u8 {
        mmu.get(addr, Width::Byte) as u8
    }

    #[inline]
    fn write8(mmu: &mut Mmu, addr: u16, val: u8) {
        mmu.set(addr, u16::from(val), Width::Byte);
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        Self::write8(mmu, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        Self::write8(mmu, self.regs.sp, lo);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let val = mmu.get(self.regs.sp, Width::Word);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        val
    }

    fn read_operand(&mut self, mmu: &mut Mmu, index: u8) -> u8 {
        if index == OPERAND_HL {
            Self::read8(mmu, self.regs.get16(Reg16::HL))
        } else {
            self.regs.get8(R8[index as usize])
        }
    }

    fn write_operand(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        if index == OPERAND_HL {
            Self::write8(mmu, self.regs.get16(Reg16::HL), val);
        } else {
            self.regs.set8(R8[index as usize], val);
        }
    }

    /// NZ, Z, NC, C.
    fn condition(&self, cc: u8) -> bool {
        match cc {
            0 => !self.regs.flag(Flag::Z),
            1 => self.regs.flag(Flag::Z),
            2 => !self.regs.flag(Flag::C),
            _ => self.regs.flag(Flag::C),
        }
    }

    fn jump_relative(&mut self, mmu: &mut Mmu, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as u16);
        mmu.update(M_CYCLE);
    }

    fn call(&mut self, mmu: &mut Mmu, target: u16) {
        mmu.update(M_CYCLE);
        self.push_stack(mmu, self.regs.pc);
        self.regs.pc = target;
    }

    fn ret(&mut self, mmu: &mut Mmu) {
        self.regs.pc = self.pop_stack(mmu);
        mmu.update(M_CYCLE);
    }

    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP on A.
    fn alu(&mut self, op: u8, val: u8) {
        let a = self.regs.get8(Reg8::A);
        let carry_in = u8::from(self.regs.flag(Flag::C));
        let (res, n, h, c) = match op {
            0 | 1 => {
                let cin = if op == 1 { carry_in } else { 0 };
                let sum = u16::from(a) + u16::from(val) + u16::from(cin);
                let h = (a & 0x0F) + (val & 0x0F) + cin > 0x0F;
                (sum as u8, false, h, sum > 0xFF)
            }
            2 | 3 | 7 => {
                let cin = if op == 3 { carry_in } else { 0 };
                let res = a.wrapping_sub(val).wrapping_sub(cin);
                let h = (a & 0x0F) < (val & 0x0F) + cin;
                let c = u16::from(a) < u16::from(val) + u16::from(cin);
                (res, true, h, c)
            }
            4 => (a & val, false, true, false),
            5 => (a ^ val, false, false, false),
            _ => (a | val, false, false, false),
        };
        self.regs.set_flags(res == 0, n, h, c);
        if op != 7 {
            self.regs.set8(Reg8::A, res);
        }
    }

    /// RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL. Sets all four flags.
    fn shift(&mut self, op: u8, val: u8) -> u8 {
        let carry_in = u8::from(self.regs.flag(Flag::C));
        let (res, carry) = match op {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => ((val << 1) | carry_in, val & 0x80 != 0),
            3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => (val.rotate_left(4), false),
            _ => (val >> 1, val & 0x01 != 0),
        };
        self.regs.set_flags(res == 0, false, false, carry);
        res
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.regs.set_flag(Flag::Z, res == 0);
        self.regs.set_flag(Flag::N, false);
        self.regs.set_flag(Flag::H, val & 0x0F == 0x0F);
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.regs.set_flag(Flag::Z, res == 0);
        self.regs.set_flag(Flag::N, true);
        self.regs.set_flag(Flag::H, val & 0x0F == 0);
        res
    }

    /// SP plus a signed byte, with H and C from the low byte add.
    fn sp_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp;
        let val = offset as i8 as u16;
        self.regs.set_flags(
            false,
            false,
            (sp & 0x000F) + (val & 0x000F) > 0x000F,
            (sp & 0x00FF) + (val & 0x00FF) > 0x00FF,
        );
        sp.wrapping_add(val)
    }

    fn daa(&mut self) {
        let mut a = self.regs.get8(Reg8::A);
        let n = self.regs.flag(Flag::N);
        let mut correction = 0u8;
        let mut carry = false;
        if self.regs.flag(Flag::H) || (!n && (a & 0x0F) > 0x09) {
            correction |= 0x06;
        }
        if self.regs.flag(Flag::C) || (!n && a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        a = if n {
            a.wrapping_sub(correction)
        } else {
            a.wrapping_add(correction)
        };
        self.regs.set8(Reg8::A, a);
        self.regs.set_flags(a == 0, n, false, carry);
    }

    fn handle_cb(&mut self, mmu: &mut Mmu) {
        let op = self.fetch8(mmu);
        let x = op >> 6;
        let y = (op >> 3) & 0x07;
        let z = op & 0x07;
        let val = self.read_operand(mmu, z);
        match x {
            0 => {
                let res = self.shift(y, val);
                self.write_operand(mmu, z, res);
            }
            1 => {
                self.regs.set_flag(Flag::Z, val & (1 << y) == 0);
                self.regs.set_flag(Flag::N, false);
                self.regs.set_flag(Flag::H, true);
            }
            2 => self.write_operand(mmu, z, val & !(1 << y)),
            _ => self.write_operand(mmu, z, val | (1 << y)),
        }
    }

    /// Wake from HALT on any request; dispatch at most one enabled interrupt.
    fn handle_interrupts(&mut self, mmu: &mut Mmu) {
        let requested = mmu.if_reg & 0x1F;
        if requested == 0 {
            return;
        }
        self.halted = false;

        let pending = requested & mmu.ie_reg;
        if !self.ime || pending == 0 {
            return;
        }

        let (bit, vector) = Self::next_interrupt(pending);
        mmu.update(2 * M_CYCLE);
        mmu.if_reg &= !bit;
        self.ime = false;
        self.push_stack(mmu, self.regs.pc);
        mmu.update(M_CYCLE);
        self.regs.pc = vector;
    }

    /// Execute one instruction, or idle one machine cycle while halted, then
    /// service interrupts.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<(), CpuError> {
        let start = mmu.cycles;

        if self.halted {
            mmu.update(M_CYCLE);
        } else {
            #[cfg(feature = "cpu-trace")]
            trace!("{}", self.debug_state());

            let enable_after = self.ime_enable_delay == 1;
            let addr = self.regs.pc;
            let opcode = self.fetch8(mmu);
            self.execute(mmu, opcode)
                .ok_or(CpuError::UnknownOpcode { opcode, addr })?;

            if enable_after && self.ime_enable_delay > 0 {
                self.ime = true;
            }
            if self.ime_enable_delay > 0 {
                self.ime_enable_delay -= 1;
            }
        }

        self.handle_interrupts(mmu);
        self.cycles += mmu.cycles - start;
        Ok(())
    }

    /// Returns `None` for the eleven unused opcodes.
    fn execute(&mut self, mmu: &mut Mmu, opcode: u8) -> Option<()> {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = (y >> 1) as usize;
        let q = y & 0x01;

        match (x, z) {
            (0, 0) => match y {
                0 => {}
                1 => {
                    let addr = self.fetch16(mmu);
                    mmu.set(addr, self.regs.sp, Width::Word);
                }
                // STOP: the padding byte is skipped and nothing else happens.
                2 => {
                    self.fetch8(mmu);
                }
                3 => {
                    let offset = self.fetch8(mmu);
                    self.jump_relative(mmu, offset);
                }
                _ => {
                    let offset = self.fetch8(mmu);
                    if self.condition(y - 4) {
                        self.jump_relative(mmu, offset);
                    }
                }
            },
            (0, 1) => {
                if q == 0 {
                    let val = self.fetch16(mmu);
                    self.regs.set16(RP[p], val);
                } else {
                    let hl = self.regs.get16(Reg16::HL);
                    let val = self.regs.get16(RP[p]);
                    let res = hl.wrapping_add(val);
                    self.regs.set_flag(Flag::N, false);
                    self.regs.set_flag(Flag::H, (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF);
                    self.regs.set_flag(Flag::C, u32::from(hl) + u32::from(val) > 0xFFFF);
                    self.regs.set16(Reg16::HL, res);
                    mmu.update(M_CYCLE);
                }
            }
            (0, 2) => {
                let addr = match p {
                    0 => self.regs.get16(Reg16::BC),
                    1 => self.regs.get16(Reg16::DE),
                    _ => {
                        let hl = self.regs.get16(Reg16::HL);
                        let next = if p == 2 {
                            hl.wrapping_add(1)
                        } else {
                            hl.wrapping_sub(1)
                        };
                        self.regs.set16(Reg16::HL, next);
                        hl
                    }
                };
                if q == 0 {
                    Self::write8(mmu, addr, self.regs.get8(Reg8::A));
                } else {
                    let val = Self::read8(mmu, addr);
                    self.regs.set8(Reg8::A, val);
                }
            }
            (0, 3) => {
                let val = self.regs.get16(RP[p]);
                let res = if q == 0 {
                    val.wrapping_add(1)
                } else {
                    val.wrapping_sub(1)
                };
                self.regs.set16(RP[p], res);
                mmu.update(M_CYCLE);
            }
            (0, 4) => {
                let val = self.read_operand(mmu, y);
                let res = self.inc8(val);
                self.write_operand(mmu, y, res);
            }
            (0, 5) => {
                let val = self.read_operand(mmu, y);
                let res = self.dec8(val);
                self.write_operand(mmu, y, res);
            }
            (0, 6) => {
                let val = self.fetch8(mmu);
                self.write_operand(mmu, y, val);
            }
            (0, _) => match y {
                0..=3 => {
                    let res = self.shift(y, self.regs.get8(Reg8::A));
                    self.regs.set8(Reg8::A, res);
                    self.regs.set_flag(Flag::Z, false);
                }
                4 => self.daa(),
                5 => {
                    self.regs.set8(Reg8::A, !self.regs.get8(Reg8::A));
                    self.regs.set_flag(Flag::N, true);
                    self.regs.set_flag(Flag::H, true);
                }
                6 => {
                    self.regs.set_flag(Flag::N, false);
                    self.regs.set_flag(Flag::H, false);
                    self.regs.set_flag(Flag::C, true);
                }
                _ => {
                    let carry = self.regs.flag(Flag::C);
                    self.regs.set_flag(Flag::N, false);
                    self.regs.set_flag(Flag::H, false);
                    self.regs.set_flag(Flag::C, !carry);
                }
            },
            (1, _) => {
                if y == OPERAND_HL && z == OPERAND_HL {
                    self.halted = true;
                } else {
                    let val = self.read_operand(mmu, z);
                    self.write_operand(mmu, y, val);
                }
            }
            (2, _) => {
                let val = self.read_operand(mmu, z);
                self.alu(y, val);
            }
            (3, 0) => match y {
                0..=3 => {
                    mmu.update(M_CYCLE);
                    if self.condition(y) {
                        self.ret(mmu);
                    }
                }
                4 => {
                    let offset = self.fetch8(mmu);
                    Self::write8(mmu, 0xFF00 | u16::from(offset), self.regs.get8(Reg8::A));
                }
                5 => {
                    let offset = self.fetch8(mmu);
                    let res = self.sp_offset(offset);
                    self.regs.sp = res;
                    mmu.update(2 * M_CYCLE);
                }
                6 => {
                    let offset = self.fetch8(mmu);
                    let val = Self::read8(mmu, 0xFF00 | u16::from(offset));
                    self.regs.set8(Reg8::A, val);
                }
                _ => {
                    let offset = self.fetch8(mmu);
                    let res = self.sp_offset(offset);
                    self.regs.set16(Reg16::HL, res);
                    mmu.update(M_CYCLE);
                }
            },
            (3, 1) => {
                if q == 0 {
                    let val = self.pop_stack(mmu);
                    self.regs.set16(RP2[p], val);
                } else {
                    match p {
                        0 => self.ret(mmu),
                        1 => {
                            self.ret(mmu);
                            self.ime = true;
                            self.ime_enable_delay = 0;
                        }
                        2 => self.regs.pc = self.regs.get16(Reg16::HL),
                        _ => {
                            self.regs.sp = self.regs.get16(Reg16::HL);
                            mmu.update(M_CYCLE);
                        }
                    }
                }
            }
            (3, 2) => match y {
                0..=3 => {
                    let target = self.fetch16(mmu);
                    if self.condition(y) {
                        self.regs.pc = target;
                        mmu.update(M_CYCLE);
                    }
                }
                4 => {
                    let addr = 0xFF00 | u16::from(self.regs.get8(Reg8::C));
                    Self::write8(mmu, addr, self.regs.get8(Reg8::A));
                }
                5 => {
                    let addr = self.fetch16(mmu);
                    Self::write8(mmu, addr, self.regs.get8(Reg8::A));
                }
                6 => {
                    let addr = 0xFF00 | u16::from(self.regs.get8(Reg8::C));
                    let val = Self::read8(mmu, addr);
                    self.regs.set8(Reg8::A, val);
                }
                _ => {
                    let addr = self.fetch16(mmu);
                    let val = Self::read8(mmu, addr);
                    self.regs.set8(Reg8::A, val);
                }
            },
            (3, 3) => match y {
                0 => {
                    let target = self.fetch16(mmu);
                    self.regs.pc = target;
                    mmu.update(M_CYCLE);
                }
                1 => self.handle_cb(mmu),
                6 => {
                    self.ime = false;
                    self.ime_enable_delay = 0;
                }
                7 => self.ime_enable_delay = 2,
                _ => return None,
            },
            (3, 4) => {
                if y > 3 {
                    return None;
                }
                let target = self.fetch16(mmu);
                if self.condition(y) {
                    self.call(mmu, target);
                }
            }
            (3, 5) => {
                if q == 0 {
                    mmu.update(M_CYCLE);
                    self.push_stack(mmu, self.regs.get16(RP2[p]));
                } else if p == 0 {
                    let target = self.fetch16(mmu);
                    self.call(mmu, target);
                } else {
                    return None;
                }
            }
            (3, 6) => {
                let val = self.fetch8(mmu);
                self.alu(y, val);
            }
            _ => self.call(mmu, u16::from(y) * 8),
        }
        Some(())
    }

    /// Let the next [`Cpu::run_frame`] execute the instruction at PC without
    /// stopping on it.
    pub fn step_over_breakpoint(&mut self) {
        self.skip_breakpoint = true;
    }

    /// Run until a frame's worth of cycles has elapsed or PC lands on an
    /// enabled breakpoint, checked before each instruction. Cycles past the
    /// frame boundary count toward the next frame.
    pub fn run_frame(
        &mut self,
        mmu: &mut Mmu,
        breakpoints: &Breakpoints,
    ) -> Result<FrameOutcome, CpuError> {
        while self.frame_cycles < CYCLES_PER_FRAME {
            let skip = std::mem::take(&mut self.skip_breakpoint);
            if !skip && breakpoints.is_hit(self.regs.pc) {
                trace!("Breakpoint at {:04X}", self.regs.pc);
                return Ok(FrameOutcome::Breakpoint(self.regs.pc));
            }
            let start = mmu.cycles;
            self.step(mmu)?;
            self.frame_cycles += mmu.cycles - start;
        }
        self.frame_cycles -= CYCLES_PER_FRAME;
        Ok(FrameOutcome::Complete)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
