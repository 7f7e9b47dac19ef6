use crate::{
    apu::{AudioUnit, SoundRegisters},
    cartridge::Cartridge,
    joypad::{Button, Joypad},
    ppu::{LcdRegisters, VideoUnit},
    timer::Timer,
};

const WRAM_SIZE: usize = 0x2000;

/// Cycles charged per byte moved by [`Mmu::get`] and [`Mmu::set`].
pub const ACCESS_CYCLES: u32 = 4;

const JOYPAD_INTERRUPT: u8 = 0x10;

/// Number of bytes a bus access moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

pub struct Mmu {
    pub cart: Option<Cartridge>,
    wram: Box<[u8]>,
    /// Backing store for every address without a dedicated device.
    flat: Box<[u8]>,
    /// Low five bits only; reads see the upper three as set.
    pub if_reg: u8,
    pub ie_reg: u8,
    pub timer: Timer,
    pub joypad: Joypad,
    pub ppu: Box<dyn VideoUnit>,
    pub apu: Option<Box<dyn AudioUnit>>,
    /// Every cycle charged through [`Mmu::update`] since reset.
    pub cycles: u64,
}

impl Mmu {
    pub fn new() -> Self {
        Self::with_units(
            Box::new(LcdRegisters::new()),
            Some(Box::new(SoundRegisters::new())),
        )
    }

    /// Build a bus around caller supplied video and audio implementations.
    pub fn with_units(ppu: Box<dyn VideoUnit>, apu: Option<Box<dyn AudioUnit>>) -> Self {
        let mut mmu = Self {
            cart: None,
            wram: vec![0; WRAM_SIZE].into_boxed_slice(),
            flat: vec![0; 0x10000].into_boxed_slice(),
            if_reg: 0,
            ie_reg: 0,
            timer: Timer::new(),
            joypad: Joypad::new(),
            ppu,
            apu,
            cycles: 0,
        };
        mmu.reset();
        mmu
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// Power-on register values. The cartridge stays inserted.
    pub fn reset(&mut self) {
        self.wram.fill(0);
        self.flat.fill(0);
        self.if_reg = 0x01;
        self.ie_reg = 0;
        self.timer.reset();
        self.joypad = Joypad::new();
        self.ppu.reset();
        if let Some(apu) = self.apu.as_mut() {
            apu.reset();
        }
        self.cycles = 0;
    }

    fn cart_ram(&self) -> Option<&Cartridge> {
        self.cart.as_ref().filter(|c| c.has_ram())
    }

    /// Read without charging any cycles.
    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => match &self.cart {
                Some(cart) => cart.read(addr),
                None => self.flat[addr as usize],
            },
            0xA000..=0xBFFF => match self.cart_ram() {
                Some(cart) => cart.read(addr),
                None => self.flat[addr as usize],
            },
            0xC000..=0xDFFF => self.wram[addr as usize - 0xC000],
            0xE000..=0xFDFF => self.wram[addr as usize - 0xE000],
            0xFF00 => self.joypad.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF26 => match &self.apu {
                Some(apu) => apu.read_reg(addr),
                None => self.flat[addr as usize],
            },
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFFFF => self.ie_reg,
            _ => self.flat[addr as usize],
        }
    }

    /// Write without charging any cycles.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => match self.cart.as_mut() {
                Some(cart) => cart.write(addr, val),
                None => self.flat[addr as usize] = val,
            },
            0xA000..=0xBFFF => match self.cart.as_mut().filter(|c| c.has_ram()) {
                Some(cart) => cart.write(addr, val),
                None => self.flat[addr as usize] = val,
            },
            0xC000..=0xDFFF => self.wram[addr as usize - 0xC000] = val,
            0xE000..=0xFDFF => self.wram[addr as usize - 0xE000] = val,
            0xFF00 => self.joypad.write(val),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = val & 0x1F,
            0xFF10..=0xFF26 => match self.apu.as_mut() {
                Some(apu) => apu.write_reg(addr, val),
                None => self.flat[addr as usize] = val,
            },
            0xFF46 => {
                self.ppu.write_reg(addr, val);
                self.oam_dma(val);
            }
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFFFF => self.ie_reg = val,
            _ => self.flat[addr as usize] = val,
        }
    }

    /// Instant OAM DMA: copy 160 bytes from `page << 8` to 0xFE00.
    fn oam_dma(&mut self, page: u8) {
        let src = u16::from(page) << 8;
        for i in 0..0xA0 {
            let byte = self.read_byte(src.wrapping_add(i));
            self.flat[0xFE00 + i as usize] = byte;
        }
    }

    /// Charged read: each byte costs [`ACCESS_CYCLES`], little endian.
    pub fn get(&mut self, addr: u16, width: Width) -> u16 {
        let lo = self.read_byte(addr);
        self.update(ACCESS_CYCLES);
        match width {
            Width::Byte => u16::from(lo),
            Width::Word => {
                let hi = self.read_byte(addr.wrapping_add(1));
                self.update(ACCESS_CYCLES);
                u16::from_le_bytes([lo, hi])
            }
        }
    }

    /// Charged write: each byte costs [`ACCESS_CYCLES`], little endian.
    pub fn set(&mut self, addr: u16, value: u16, width: Width) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo);
        self.update(ACCESS_CYCLES);
        if width == Width::Word {
            self.write_byte(addr.wrapping_add(1), hi);
            self.update(ACCESS_CYCLES);
        }
    }

    /// The clock sink. Everything that counts time advances from here.
    pub fn update(&mut self, cycles: u32) {
        self.cycles += u64::from(cycles);
        self.timer.step(cycles, &mut self.if_reg);
        if let Some(cart) = self.cart.as_mut() {
            cart.step(cycles);
        }
        self.ppu.step(cycles, &mut self.if_reg);
        if let Some(apu) = self.apu.as_mut() {
            apu.step(cycles);
        }
    }

    /// Latch a button and request the joypad interrupt on a selected press.
    pub fn update_input(&mut self, button: Button, pressed: bool) {
        if self.joypad.update(button, pressed) {
            self.if_reg |= JOYPAD_INTERRUPT;
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
