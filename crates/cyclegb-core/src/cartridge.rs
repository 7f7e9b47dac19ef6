use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, trace, warn};
use thiserror::Error;

use crate::CPU_FREQUENCY;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MBC3_RAM_SIZE: usize = 0x8000;

/// Emulated mode looks at its cycle accumulator this often.
const RTC_EMULATED_CHECK: u32 = CPU_FREQUENCY / 32;
/// Wall-clock mode polls the host clock this often.
const RTC_WALL_CHECK: u32 = CPU_FREQUENCY;

/// Size of the clock block appended to a timer cartridge's save.
pub const RTC_SAVE_LEN: usize = 48;
/// Older saves end with a 32-bit timestamp instead of a 64-bit one.
pub const RTC_SAVE_LEN_SHORT: usize = 44;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("save data is {len} bytes but cartridge RAM needs {expected}")]
    TooShort { len: usize, expected: usize },
    #[error("unexpected {len}-byte block after cartridge RAM")]
    BadRtcBlock { len: usize },
}

/// How the MBC3 clock decides that a second has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RtcClock {
    /// Poll the host clock once per emulated second.
    #[default]
    Wall,
    /// Count CPU cycles; one second per `CPU_FREQUENCY` cycles.
    Emulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    RomOnly,
    Mbc1,
    Mbc3,
}

/// Cartridge header fields read from fixed ROM offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub cart_type: u8,
    pub kind: MbcKind,
    pub rom_size: usize,
    pub ram_size: usize,
    pub battery: bool,
    pub timer: bool,
}

impl Header {
    pub fn parse(rom: &[u8]) -> Self {
        let byte = |addr: usize| rom.get(addr).copied().unwrap_or(0);

        let title_end = 0x0144.min(rom.len());
        let mut title = rom.get(0x0134..title_end).unwrap_or(&[]);
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        let title = String::from_utf8_lossy(title).trim().to_string();

        let cart_type = byte(0x0147);
        let kind = match cart_type {
            0x00 | 0x08 | 0x09 => MbcKind::RomOnly,
            0x01..=0x03 => MbcKind::Mbc1,
            0x0F..=0x13 => MbcKind::Mbc3,
            other => {
                warn!("Unsupported cartridge type {other:02X}, mapping ROM without banking");
                MbcKind::RomOnly
            }
        };

        let rom_code = byte(0x0148);
        let rom_size = if rom_code <= 0x08 {
            0x8000 << rom_code
        } else {
            rom.len()
        };

        let ram_size = match byte(0x0149) {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        };

        Self {
            title,
            cart_type,
            kind,
            rom_size,
            ram_size,
            battery: matches!(
                cart_type,
                0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E | 0x22 | 0xFF
            ),
            timer: matches!(cart_type, 0x0F | 0x10),
        }
    }
}

/// The five clock registers as the game sees them at 0x08..=0x0C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_low: u8,
    /// Bit 0: day bit 8. Bit 6: halt. Bit 7: day counter carry.
    pub day_high: u8,
}

impl RtcRegisters {
    const HALT: u8 = 0x40;
    const CARRY: u8 = 0x80;

    fn get(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.seconds,
            0x09 => self.minutes,
            0x0A => self.hours,
            0x0B => self.day_low,
            0x0C => self.day_high,
            _ => 0xFF,
        }
    }

    fn set(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => self.seconds = value & 0x3F,
            0x09 => self.minutes = value & 0x3F,
            0x0A => self.hours = value & 0x1F,
            0x0B => self.day_low = value,
            0x0C => self.day_high = value & 0xC1,
            _ => {}
        }
    }

    pub fn days(&self) -> u16 {
        u16::from(self.day_low) | (u16::from(self.day_high & 0x01) << 8)
    }

    fn set_days(&mut self, days: u16) {
        self.day_low = days as u8;
        self.day_high = (self.day_high & !0x01) | ((days >> 8) as u8 & 0x01);
    }

    pub fn halted(&self) -> bool {
        self.day_high & Self::HALT != 0
    }

    pub fn carry(&self) -> bool {
        self.day_high & Self::CARRY != 0
    }

    fn to_slots(self) -> [u8; 5] {
        [
            self.seconds,
            self.minutes,
            self.hours,
            self.day_low,
            self.day_high,
        ]
    }

    fn from_slots(slots: &[u8]) -> Self {
        let mut regs = Self::default();
        for (reg, chunk) in (0x08..=0x0C).zip(slots.chunks_exact(4)) {
            regs.set(reg, chunk[0]);
        }
        regs
    }
}

fn system_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// MBC3 real-time clock.
#[derive(Debug, Clone)]
pub struct Rtc {
    pub live: RtcRegisters,
    pub latched: RtcRegisters,
    clock: RtcClock,
    now: fn() -> u64,
    /// Host time in seconds the wall clock last caught up to.
    timestamp: u64,
    /// Emulated cycles not yet converted into whole seconds.
    subsecond_cycles: u32,
    /// Cycles since the last check.
    check_cycles: u32,
}

impl Rtc {
    pub fn new(clock: RtcClock, now: fn() -> u64) -> Self {
        Self {
            live: RtcRegisters::default(),
            latched: RtcRegisters::default(),
            clock,
            now,
            timestamp: now(),
            subsecond_cycles: 0,
            check_cycles: 0,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn latch(&mut self) {
        self.latched = self.live;
    }

    fn read(&self, reg: u8) -> u8 {
        self.latched.get(reg)
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.live.set(reg, value);
        self.latched.set(reg, value);
        if reg == 0x08 {
            self.subsecond_cycles = 0;
        }
    }

    pub fn step(&mut self, cycles: u32) {
        self.check_cycles += cycles;
        match self.clock {
            RtcClock::Emulated => {
                if !self.live.halted() {
                    self.subsecond_cycles += cycles;
                }
                if self.check_cycles >= RTC_EMULATED_CHECK {
                    self.check_cycles = 0;
                    let seconds = self.subsecond_cycles / CPU_FREQUENCY;
                    self.subsecond_cycles %= CPU_FREQUENCY;
                    self.advance_seconds(u64::from(seconds));
                }
            }
            RtcClock::Wall => {
                if self.check_cycles >= RTC_WALL_CHECK {
                    self.check_cycles = 0;
                    self.sync_wall();
                }
            }
        }
    }

    fn sync_wall(&mut self) {
        let now = (self.now)();
        let elapsed = now.saturating_sub(self.timestamp);
        self.timestamp = now;
        if !self.live.halted() {
            self.advance_seconds(elapsed);
        }
    }

    /// Tick the live registers forward. Values outside their normal range
    /// count up to the register mask before wrapping, like the real chip.
    pub fn advance_seconds(&mut self, mut seconds: u64) {
        while seconds > 0 {
            let until_minute = self.seconds_until_minute_tick();
            if seconds < until_minute {
                self.live.seconds = ((u64::from(self.live.seconds) + seconds) & 0x3F) as u8;
                return;
            }
            seconds -= until_minute;
            self.live.seconds = 0;
            self.minute_tick();
        }
    }

    fn seconds_until_minute_tick(&self) -> u64 {
        let sec = u64::from(self.live.seconds);
        if sec <= 59 { 60 - sec } else { 64 - sec + 60 }
    }

    fn minute_tick(&mut self) {
        if self.live.minutes == 59 {
            self.live.minutes = 0;
            self.hour_tick();
        } else {
            self.live.minutes = (self.live.minutes + 1) & 0x3F;
        }
    }

    fn hour_tick(&mut self) {
        if self.live.hours == 23 {
            self.live.hours = 0;
            self.day_tick();
        } else {
            self.live.hours = (self.live.hours + 1) & 0x1F;
        }
    }

    fn day_tick(&mut self) {
        let days = self.live.days();
        if days >= 0x01FF {
            self.live.set_days(0);
            self.live.day_high |= RtcRegisters::CARRY;
        } else {
            self.live.set_days(days + 1);
        }
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        for regs in [self.live, self.latched] {
            for slot in regs.to_slots() {
                out.extend_from_slice(&u32::from(slot).to_le_bytes());
            }
        }
        out.extend_from_slice(&self.timestamp.to_le_bytes());
    }

    fn restore(&mut self, block: &[u8]) {
        self.live = RtcRegisters::from_slots(&block[..20]);
        self.latched = RtcRegisters::from_slots(&block[20..40]);
        let mut stamp = [0u8; 8];
        let tail = &block[40..];
        stamp[..tail.len()].copy_from_slice(tail);
        self.timestamp = u64::from_le_bytes(stamp);
        self.subsecond_cycles = 0;
        self.check_cycles = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mbc3Select {
    RamBank(u8),
    Clock(u8),
}

#[derive(Debug, Clone)]
enum Mapper {
    RomOnly,
    Mbc1 {
        rom_bank: u8,
        ram_enabled: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_enabled: bool,
        select: Mbc3Select,
        latch_armed: bool,
        rtc: Option<Rtc>,
    },
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    header: Header,
    mapper: Mapper,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>, clock: RtcClock) -> Self {
        Self::with_time_source(rom, clock, system_now)
    }

    /// Like [`Cartridge::new`] with a custom host clock in Unix seconds.
    pub fn with_time_source(rom: Vec<u8>, clock: RtcClock, now: fn() -> u64) -> Self {
        let header = Header::parse(&rom);
        let (mapper, ram_size) = match header.kind {
            MbcKind::RomOnly => (Mapper::RomOnly, 0),
            MbcKind::Mbc1 => (
                Mapper::Mbc1 {
                    rom_bank: 1,
                    ram_enabled: false,
                },
                header.ram_size.min(RAM_BANK_SIZE),
            ),
            MbcKind::Mbc3 => (
                Mapper::Mbc3 {
                    rom_bank: 1,
                    ram_enabled: false,
                    select: Mbc3Select::RamBank(0),
                    latch_armed: false,
                    rtc: header.timer.then(|| Rtc::new(clock, now)),
                },
                MBC3_RAM_SIZE,
            ),
        };

        info!(
            "Loaded cartridge \"{}\" ({:?}, type {:02X}, {} KiB ROM, {} KiB RAM{})",
            header.title,
            header.kind,
            header.cart_type,
            rom.len() / 1024,
            ram_size / 1024,
            if header.timer { ", RTC" } else { "" }
        );

        Self {
            rom,
            ram: vec![0; ram_size],
            header,
            mapper,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether 0xA000..=0xBFFF is served by the cartridge.
    pub fn has_ram(&self) -> bool {
        !self.ram.is_empty()
    }

    /// Bank mapped at 0x4000..=0x7FFF, never 0 as written.
    pub fn rom_bank(&self) -> u8 {
        match self.mapper {
            Mapper::RomOnly => 1,
            Mapper::Mbc1 { rom_bank, .. } | Mapper::Mbc3 { rom_bank, .. } => rom_bank,
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        match &self.mapper {
            Mapper::Mbc3 { rtc, .. } => rtc.as_ref(),
            _ => None,
        }
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match &mut self.mapper {
            Mapper::Mbc3 { rtc, .. } => rtc.as_mut(),
            _ => None,
        }
    }

    fn rom_byte(&self, bank: usize, offset: usize) -> u8 {
        let banks = self.rom.len().div_ceil(ROM_BANK_SIZE).max(1);
        let index = (bank % banks) * ROM_BANK_SIZE + offset;
        self.rom.get(index).copied().unwrap_or(0xFF)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => self.rom_byte(self.rom_bank() as usize, addr as usize - 0x4000),
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        let offset = addr as usize - 0xA000;
        match &self.mapper {
            Mapper::RomOnly => 0xFF,
            Mapper::Mbc1 { ram_enabled, .. } => {
                if *ram_enabled && !self.ram.is_empty() {
                    self.ram[offset % self.ram.len()]
                } else {
                    0xFF
                }
            }
            Mapper::Mbc3 {
                ram_enabled,
                select,
                rtc,
                ..
            } => {
                if !*ram_enabled {
                    return 0;
                }
                match *select {
                    Mbc3Select::RamBank(bank) => self.ram[bank as usize * RAM_BANK_SIZE + offset],
                    Mbc3Select::Clock(reg) => rtc.as_ref().map_or(0xFF, |rtc| rtc.read(reg)),
                }
            }
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let ram_len = self.ram.len();
        match &mut self.mapper {
            Mapper::RomOnly => {}
            Mapper::Mbc1 {
                rom_bank,
                ram_enabled,
            } => match addr {
                0x0000..=0x1FFF => *ram_enabled = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    let low = match val & 0x1F {
                        0 => 1,
                        n => n,
                    };
                    *rom_bank = (*rom_bank & 0x60) | low;
                    trace!("MBC1 ROM bank {:02X}", *rom_bank);
                }
                0x4000..=0x5FFF => {
                    *rom_bank = (*rom_bank & 0x1F) | ((val & 0x03) << 5);
                    trace!("MBC1 ROM bank {:02X}", *rom_bank);
                }
                0x6000..=0x7FFF => trace!("MBC1 mode select {val:02X} ignored"),
                0xA000..=0xBFFF => {
                    if *ram_enabled && ram_len > 0 {
                        self.ram[(addr as usize - 0xA000) % ram_len] = val;
                    }
                }
                _ => {}
            },
            Mapper::Mbc3 {
                rom_bank,
                ram_enabled,
                select,
                latch_armed,
                rtc,
            } => match addr {
                0x0000..=0x1FFF => *ram_enabled = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    *rom_bank = match val & 0x7F {
                        0 => 1,
                        n => n,
                    };
                    trace!("MBC3 ROM bank {:02X}", *rom_bank);
                }
                0x4000..=0x5FFF => match val {
                    0x00..=0x03 => *select = Mbc3Select::RamBank(val),
                    0x08..=0x0C if rtc.is_some() => *select = Mbc3Select::Clock(val),
                    _ => trace!("MBC3 bank select {val:02X} ignored"),
                },
                0x6000..=0x7FFF => {
                    if val == 0x01 && *latch_armed {
                        if let Some(rtc) = rtc.as_mut() {
                            rtc.latch();
                        }
                    }
                    *latch_armed = val == 0x00;
                }
                0xA000..=0xBFFF => {
                    if !*ram_enabled {
                        return;
                    }
                    match *select {
                        Mbc3Select::RamBank(bank) => {
                            self.ram[bank as usize * RAM_BANK_SIZE + addr as usize - 0xA000] = val;
                        }
                        Mbc3Select::Clock(reg) => {
                            if let Some(rtc) = rtc.as_mut() {
                                rtc.write(reg, val);
                            }
                        }
                    }
                }
                _ => {}
            },
        }
    }

    /// Advance the cartridge clock, if there is one.
    pub fn step(&mut self, cycles: u32) {
        if let Some(rtc) = self.rtc_mut() {
            rtc.step(cycles);
        }
    }

    /// Battery RAM followed by the clock block on timer cartridges.
    pub fn save_sram(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ram.len() + RTC_SAVE_LEN);
        out.extend_from_slice(&self.ram);
        if let Some(rtc) = self.rtc() {
            rtc.serialize(&mut out);
        }
        out
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<(), SaveError> {
        let expected = self.ram.len();
        if data.len() < expected {
            warn!(
                "Rejecting {}-byte save, cartridge RAM is {expected} bytes",
                data.len()
            );
            return Err(SaveError::TooShort {
                len: data.len(),
                expected,
            });
        }
        let (ram, trailer) = data.split_at(expected);
        let trailer_ok = match self.rtc() {
            Some(_) => matches!(trailer.len(), RTC_SAVE_LEN | RTC_SAVE_LEN_SHORT),
            None => trailer.is_empty(),
        };
        if !trailer_ok {
            warn!("Rejecting save with {}-byte trailer", trailer.len());
            return Err(SaveError::BadRtcBlock { len: trailer.len() });
        }

        self.ram.copy_from_slice(ram);
        if let Some(rtc) = self.rtc_mut() {
            rtc.restore(trailer);
        }
        Ok(())
    }
}
