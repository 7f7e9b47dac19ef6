//! LR35902 register file.
//!
//! The eight 8-bit registers live in one byte array so the 16-bit pairs are
//! views over the same storage: writing A is visible through AF and the other
//! way round.

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

// Post-boot DMG (rev A/B/C) state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_AF: u16 = 0x01B0;
const BOOT_BC: u16 = 0x0013;
const BOOT_DE: u16 = 0x00D8;
const BOOT_HL: u16 = 0x014D;
const BOOT_SP: u16 = 0xFFFE;
const BOOT_PC: u16 = 0x0100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
}

impl Reg8 {
    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    Z,
    N,
    H,
    C,
}

impl Flag {
    #[inline]
    pub const fn mask(self) -> u8 {
        match self {
            Flag::Z => FLAG_Z,
            Flag::N => FLAG_N,
            Flag::H => FLAG_H,
            Flag::C => FLAG_C,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    /// A, F, B, C, D, E, H, L in pair order.
    bytes: [u8; 8],
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// All registers cleared.
    pub fn new() -> Self {
        Self {
            bytes: [0; 8],
            sp: 0,
            pc: 0,
        }
    }

    /// Register contents after the DMG boot ROM hands over to the cartridge.
    pub fn post_boot() -> Self {
        let mut regs = Self::new();
        regs.set16(Reg16::AF, BOOT_AF);
        regs.set16(Reg16::BC, BOOT_BC);
        regs.set16(Reg16::DE, BOOT_DE);
        regs.set16(Reg16::HL, BOOT_HL);
        regs.sp = BOOT_SP;
        regs.pc = BOOT_PC;
        regs
    }

    #[inline]
    pub fn get8(&self, reg: Reg8) -> u8 {
        self.bytes[reg.index()]
    }

    #[inline]
    pub fn set8(&mut self, reg: Reg8, val: u8) {
        let val = if reg == Reg8::F { val & 0xF0 } else { val };
        self.bytes[reg.index()] = val;
    }

    #[inline]
    fn pair(&self, hi: Reg8) -> u16 {
        let i = hi.index();
        u16::from_be_bytes([self.bytes[i], self.bytes[i + 1]])
    }

    #[inline]
    fn set_pair(&mut self, hi: Reg8, val: u16) {
        let i = hi.index();
        let [h, l] = val.to_be_bytes();
        self.bytes[i] = h;
        self.bytes[i + 1] = l;
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => self.pair(Reg8::A),
            Reg16::BC => self.pair(Reg8::B),
            Reg16::DE => self.pair(Reg8::D),
            Reg16::HL => self.pair(Reg8::H),
            Reg16::SP => self.sp,
            Reg16::PC => self.pc,
        }
    }

    pub fn set16(&mut self, reg: Reg16, val: u16) {
        match reg {
            Reg16::AF => self.set_pair(Reg8::A, val & 0xFFF0),
            Reg16::BC => self.set_pair(Reg8::B, val),
            Reg16::DE => self.set_pair(Reg8::D, val),
            Reg16::HL => self.set_pair(Reg8::H, val),
            Reg16::SP => self.sp = val,
            Reg16::PC => self.pc = val,
        }
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.bytes[Reg8::F.index()] & flag.mask() != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, on: bool) {
        let f = &mut self.bytes[Reg8::F.index()];
        if on {
            *f |= flag.mask();
        } else {
            *f &= !flag.mask();
        }
    }

    /// Overwrite all four flags at once.
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        let mut f = 0;
        if z {
            f |= FLAG_Z;
        }
        if n {
            f |= FLAG_N;
        }
        if h {
            f |= FLAG_H;
        }
        if c {
            f |= FLAG_C;
        }
        self.bytes[Reg8::F.index()] = f;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
