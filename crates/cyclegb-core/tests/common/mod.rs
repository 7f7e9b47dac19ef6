#![allow(dead_code)]

use cyclegb_core::GameBoy;

pub const ENTRY: usize = 0x0100;

/// Blank ROM of `banks` 16 KiB banks with the given header bytes.
pub fn blank_rom(banks: usize, cart_type: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; banks * 0x4000];
    rom[0x0134..0x0138].copy_from_slice(b"TEST");
    rom[0x0147] = cart_type;
    rom[0x0148] = (banks / 2).trailing_zeros() as u8;
    rom[0x0149] = ram_code;
    rom
}

/// 32 KiB ROM-only image with `program` at the entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = blank_rom(2, 0x00, 0x00);
    rom[ENTRY..ENTRY + program.len()].copy_from_slice(program);
    rom
}

/// Machine with `rom` inserted and no interrupt requested.
pub fn machine_with_rom(rom: Vec<u8>) -> GameBoy {
    let mut gb = GameBoy::new();
    gb.load_rom(rom);
    gb.mmu.if_reg = 0;
    gb
}

/// Machine running `program` from 0x0100 with no interrupt requested.
pub fn machine_with_program(program: &[u8]) -> GameBoy {
    machine_with_rom(rom_with_program(program))
}

/// Stamp the bank number into the first byte of every ROM bank.
pub fn tag_banks(rom: &mut [u8]) {
    for (bank, chunk) in rom.chunks_mut(0x4000).enumerate() {
        chunk[0] = bank as u8;
    }
}
