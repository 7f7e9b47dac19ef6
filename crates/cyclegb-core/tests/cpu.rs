mod common;

use common::{machine_with_program, machine_with_rom, rom_with_program};
use cyclegb_core::{
    CpuError,
    registers::{Flag, Reg8, Reg16},
};

#[test]
fn add_flags_for_every_operand_pair() {
    let mut gb = machine_with_program(&[]);
    // ADD A,B
    gb.mmu.write_byte(0xC000, 0x80);
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            gb.cpu.regs.pc = 0xC000;
            gb.cpu.regs.set8(Reg8::A, a);
            gb.cpu.regs.set8(Reg8::B, b);
            gb.step().unwrap();

            let sum = a as u16 + b as u16;
            let regs = &gb.cpu.regs;
            assert_eq!(regs.get8(Reg8::A), sum as u8);
            assert_eq!(regs.flag(Flag::C), sum > 0xFF, "C for {a:02X}+{b:02X}");
            assert_eq!(
                regs.flag(Flag::H),
                (a & 0x0F) + (b & 0x0F) > 0x0F,
                "H for {a:02X}+{b:02X}"
            );
            assert_eq!(regs.flag(Flag::Z), sum & 0xFF == 0, "Z for {a:02X}+{b:02X}");
            assert!(!regs.flag(Flag::N));
        }
    }
}

#[test]
fn ld_then_add_immediate() {
    let mut gb = machine_with_program(&[0x3E, 0x3C, 0xC6, 0xC6]);
    gb.step().unwrap();
    gb.step().unwrap();
    let regs = &gb.cpu.regs;
    assert_eq!(regs.get8(Reg8::A), 0x02);
    assert!(!regs.flag(Flag::Z));
    assert!(!regs.flag(Flag::N));
    assert!(regs.flag(Flag::H));
    assert!(regs.flag(Flag::C));
}

#[test]
fn jr_minus_two_loops_on_itself() {
    // JP 0x0150, and JR -2 at 0x0150
    let mut rom = rom_with_program(&[0xC3, 0x50, 0x01]);
    rom[0x0150] = 0x18;
    rom[0x0151] = 0xFE;
    let mut gb = machine_with_rom(rom);

    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0150);
    for _ in 0..3 {
        let before = gb.mmu.cycles;
        gb.step().unwrap();
        assert_eq!(gb.cpu.pc(), 0x0150);
        assert_eq!(gb.mmu.cycles - before, 12);
    }
}

#[test]
fn instruction_cycle_costs() {
    let cases: &[(&str, &[u8], u64)] = &[
        ("NOP", &[0x00], 4),
        ("LD BC,nn", &[0x01, 0x34, 0x12], 12),
        ("LD (BC),A", &[0x02], 8),
        ("INC BC", &[0x03], 8),
        ("LD B,n", &[0x06, 0x42], 8),
        ("LD (nn),SP", &[0x08, 0x00, 0xC1], 20),
        ("ADD HL,BC", &[0x09], 8),
        ("JR e", &[0x18, 0x00], 12),
        ("JR NZ,e taken", &[0x20, 0x00], 12),
        ("JR Z,e not taken", &[0x28, 0x00], 8),
        ("INC (HL)", &[0x34], 12),
        ("LD (HL),n", &[0x36, 0x11], 12),
        ("LD B,C", &[0x41], 4),
        ("LD B,(HL)", &[0x46], 8),
        ("ADD A,(HL)", &[0x86], 8),
        ("RET NZ taken", &[0xC0], 20),
        ("RET Z not taken", &[0xC8], 8),
        ("POP BC", &[0xC1], 12),
        ("JP NZ,nn taken", &[0xC2, 0x00, 0xC0], 16),
        ("JP nn", &[0xC3, 0x00, 0xC0], 16),
        ("CALL NZ,nn taken", &[0xC4, 0x00, 0xC0], 24),
        ("CALL Z,nn not taken", &[0xCC, 0x00, 0xC0], 12),
        ("PUSH BC", &[0xC5], 16),
        ("RST 38", &[0xFF], 16),
        ("RET", &[0xC9], 16),
        ("CALL nn", &[0xCD, 0x00, 0xC0], 24),
        ("LDH (n),A", &[0xE0, 0x80], 12),
        ("LD (C),A", &[0xE2], 8),
        ("ADD SP,e", &[0xE8, 0x01], 16),
        ("JP HL", &[0xE9], 4),
        ("LD (nn),A", &[0xEA, 0x00, 0xC1], 16),
        ("LD HL,SP+e", &[0xF8, 0x01], 12),
        ("LD SP,HL", &[0xF9], 8),
        ("RLC B", &[0xCB, 0x00], 8),
        ("BIT 0,(HL)", &[0xCB, 0x46], 12),
        ("SET 0,(HL)", &[0xCB, 0xC6], 16),
    ];

    let mut gb = machine_with_program(&[]);
    for (name, program, cycles) in cases {
        for (i, byte) in program.iter().enumerate() {
            gb.mmu.write_byte(0xC000 + i as u16, *byte);
        }
        gb.cpu.regs.pc = 0xC000;
        gb.cpu.regs.sp = 0xDFF0;
        gb.cpu.regs.set16(Reg16::HL, 0xC100);
        gb.cpu.regs.set16(Reg16::BC, 0xC200);
        gb.cpu.regs.set_flags(false, false, false, false);
        gb.cpu.halted = false;

        let before = gb.mmu.cycles;
        gb.step().unwrap();
        assert_eq!(gb.mmu.cycles - before, *cycles, "{name}");
    }
}

#[test]
fn vblank_wins_over_timer_then_timer_follows() {
    // EI; NOP, with RETI at the VBlank vector
    let mut rom = rom_with_program(&[0xFB, 0x00, 0x00]);
    rom[0x0040] = 0xD9;
    let mut gb = machine_with_rom(rom);
    gb.mmu.ie_reg = 0x05;
    gb.mmu.if_reg = 0x05;

    gb.step().unwrap();
    assert!(!gb.cpu.ime);
    assert_eq!(gb.cpu.pc(), 0x0101);

    // NOP, then dispatch: two idle cycles, two pushes, one vector fetch
    let before = gb.mmu.cycles;
    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0040);
    assert_eq!(gb.mmu.cycles - before, 4 + 20);
    assert_eq!(gb.mmu.if_reg, 0x04);
    assert!(!gb.cpu.ime);
    let sp = gb.cpu.regs.sp;
    assert_eq!(gb.mmu.read_byte(sp), 0x02);
    assert_eq!(gb.mmu.read_byte(sp + 1), 0x01);

    // RETI, then the timer dispatch
    let before = gb.mmu.cycles;
    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0050);
    assert_eq!(gb.mmu.cycles - before, 16 + 20);
    assert_eq!(gb.mmu.read_byte(gb.cpu.regs.sp), 0x02);
    assert_eq!(gb.mmu.if_reg, 0x00);
}

#[test]
fn ei_takes_effect_after_the_next_instruction() {
    // EI; DI; EI; NOP
    let mut gb = machine_with_program(&[0xFB, 0xF3, 0xFB, 0x00]);
    gb.mmu.ie_reg = 0x01;
    gb.mmu.if_reg = 0x01;

    gb.step().unwrap();
    assert!(!gb.cpu.ime);
    gb.step().unwrap();
    assert!(!gb.cpu.ime, "DI cancels a pending EI");
    assert_eq!(gb.cpu.pc(), 0x0102);

    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0103);
    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0040);
}

#[test]
fn halt_wakes_on_request_without_ime() {
    // HALT; INC A
    let mut gb = machine_with_program(&[0x76, 0x3C]);
    gb.mmu.ie_reg = 0x00;
    gb.step().unwrap();
    assert!(gb.cpu.halted);

    let before = gb.mmu.cycles;
    gb.step().unwrap();
    assert!(gb.cpu.halted);
    assert_eq!(gb.mmu.cycles - before, 4);

    gb.mmu.if_reg = 0x04;
    gb.step().unwrap();
    assert!(!gb.cpu.halted);
    assert_eq!(gb.cpu.pc(), 0x0101);

    let a = gb.cpu.regs.get8(Reg8::A);
    gb.step().unwrap();
    assert_eq!(gb.cpu.regs.get8(Reg8::A), a.wrapping_add(1));
}

#[test]
fn pop_af_masks_low_nibble() {
    // LD BC,0x12FF; PUSH BC; POP AF
    let mut gb = machine_with_program(&[0x01, 0xFF, 0x12, 0xC5, 0xF1]);
    for _ in 0..3 {
        gb.step().unwrap();
    }
    assert_eq!(gb.cpu.regs.get16(Reg16::AF), 0x12F0);
}

#[test]
fn ldi_and_ldd_move_hl() {
    // LD HL,0xC000; LD A,0x5A; LD (HL+),A; LD (HL-),A
    let mut gb = machine_with_program(&[0x21, 0x00, 0xC0, 0x3E, 0x5A, 0x22, 0x32]);
    for _ in 0..3 {
        gb.step().unwrap();
    }
    assert_eq!(gb.cpu.regs.get16(Reg16::HL), 0xC001);
    gb.step().unwrap();
    assert_eq!(gb.cpu.regs.get16(Reg16::HL), 0xC000);
    assert_eq!(gb.mmu.read_byte(0xC000), 0x5A);
    assert_eq!(gb.mmu.read_byte(0xC001), 0x5A);
}

#[test]
fn stop_skips_its_padding_byte() {
    // STOP; <pad 0x3C>; NOP
    let mut gb = machine_with_program(&[0x10, 0x3C, 0x00]);
    let a = gb.cpu.regs.get8(Reg8::A);
    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0102);
    assert_eq!(gb.cpu.regs.get8(Reg8::A), a);
}

#[test]
fn unused_opcodes_are_errors() {
    for opcode in [
        0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
    ] {
        let mut gb = machine_with_program(&[opcode]);
        assert_eq!(
            gb.step(),
            Err(CpuError::UnknownOpcode {
                opcode,
                addr: 0x0100
            })
        );
    }
}

#[test]
fn unknown_opcode_message_names_address() {
    let err = CpuError::UnknownOpcode {
        opcode: 0xDD,
        addr: 0x0150,
    };
    assert_eq!(err.to_string(), "unknown opcode DD at 0150");
}
