mod common;

use common::{blank_rom, machine_with_program, machine_with_rom};
use cyclegb_core::{Button, FrameOutcome, GameBoy, RtcClock, SaveError};

#[test]
fn frames_carry_surplus_cycles() {
    // JR -2
    let mut gb = machine_with_program(&[0x18, 0xFE]);
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Complete));
    assert_eq!(gb.mmu.cycles, 69_912);
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Complete));
    assert_eq!(gb.mmu.cycles, 139_812);
    assert_eq!(gb.cpu.pc(), 0x0100);
}

#[test]
fn breakpoint_pauses_until_resumed() {
    // NOP; NOP; JR -4
    let mut gb = machine_with_program(&[0x00, 0x00, 0x18, 0xFC]);
    gb.breakpoints.add(0x0101);

    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Breakpoint(0x0101)));
    assert!(gb.paused());
    assert_eq!(gb.mmu.cycles, 4);

    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Paused(0x0101)));
    assert_eq!(gb.mmu.cycles, 4);

    gb.resume();
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Breakpoint(0x0101)));
    assert_eq!(gb.mmu.cycles, 4 + 4 + 12 + 4);

    gb.resume();
    gb.breakpoints.set_enabled(0x0101, false);
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Complete));
    assert!(!gb.paused());
}

#[test]
fn breakpoint_on_entry_stops_before_running() {
    // NOP; NOP; JR -4
    let mut gb = machine_with_program(&[0x00, 0x00, 0x18, 0xFC]);
    gb.breakpoints.add(0x0100);

    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Breakpoint(0x0100)));
    assert_eq!(gb.mmu.cycles, 0);
    assert_eq!(gb.cpu.pc(), 0x0100);

    gb.resume();
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Breakpoint(0x0100)));
    assert_eq!(gb.mmu.cycles, 4 + 4 + 12);
}

#[test]
fn cpu_stays_on_a_breakpoint_until_told_to_step_over() {
    let mut gb = machine_with_program(&[0x00, 0x00, 0x18, 0xFC]);
    gb.breakpoints.add(0x0100);

    for _ in 0..2 {
        let outcome = gb.cpu.run_frame(&mut gb.mmu, &gb.breakpoints);
        assert_eq!(outcome, Ok(FrameOutcome::Breakpoint(0x0100)));
        assert_eq!(gb.mmu.cycles, 0);
    }

    gb.cpu.step_over_breakpoint();
    let outcome = gb.cpu.run_frame(&mut gb.mmu, &gb.breakpoints);
    assert_eq!(outcome, Ok(FrameOutcome::Breakpoint(0x0100)));
    assert_eq!(gb.mmu.cycles, 20);
}

#[test]
fn resume_without_pause_does_not_skip_breakpoints() {
    let mut gb = machine_with_program(&[0x00, 0x00, 0x18, 0xFC]);
    gb.breakpoints.add(0x0100);
    gb.resume();
    assert_eq!(gb.run_frame(), Ok(FrameOutcome::Breakpoint(0x0100)));
    assert_eq!(gb.mmu.cycles, 0);
}

#[test]
fn unknown_opcode_stops_the_frame() {
    let mut gb = machine_with_program(&[0x00, 0xED]);
    let err = gb.run_frame().unwrap_err();
    assert_eq!(err.to_string(), "unknown opcode ED at 0101");
}

#[test]
fn reset_keeps_cartridge_and_ram() {
    let mut gb = machine_with_rom(blank_rom(4, 0x03, 0x02));
    gb.mmu.write_byte(0x0000, 0x0A);
    gb.mmu.write_byte(0xA000, 0x42);
    gb.step().unwrap();
    gb.breakpoints.add(0x0200);

    gb.reset();
    assert_eq!(gb.cpu.pc(), 0x0100);
    assert_eq!(gb.mmu.cycles, 0);
    assert_eq!(gb.mmu.read_byte(0xA000), 0x42);
    assert_eq!(gb.breakpoints.len(), 1);
}

#[test]
fn battery_ram_survives_a_new_machine() {
    let rom = blank_rom(4, 0x03, 0x02);
    let mut gb = machine_with_rom(rom.clone());
    gb.mmu.write_byte(0x0000, 0x0A);
    gb.mmu.write_byte(0xA010, 0x5A);
    let save = gb.save_sram();
    assert_eq!(save.len(), 0x2000);

    let mut next = machine_with_rom(rom);
    next.load_sram(&save).unwrap();
    next.mmu.write_byte(0x0000, 0x0A);
    assert_eq!(next.mmu.read_byte(0xA010), 0x5A);
}

#[test]
fn timer_cart_save_includes_clock_block() {
    let mut gb = GameBoy::new_with_rtc_clock(RtcClock::Emulated);
    gb.load_rom(blank_rom(4, 0x10, 0x03));
    assert_eq!(gb.rtc_clock(), RtcClock::Emulated);
    assert_eq!(gb.save_sram().len(), 0x8000 + 48);
}

#[test]
fn saves_without_a_cartridge() {
    let mut gb = GameBoy::new();
    assert!(gb.save_sram().is_empty());
    assert_eq!(gb.load_sram(&[]), Ok(()));
    assert_eq!(
        gb.load_sram(&[1, 2, 3]),
        Err(SaveError::BadRtcBlock { len: 3 })
    );
}

#[test]
fn press_requests_joypad_interrupt() {
    // EI; NOP; NOP, with NOP at the joypad vector
    let mut gb = machine_with_program(&[0xFB, 0x00, 0x00]);
    gb.mmu.ie_reg = 0x10;
    gb.mmu.write_byte(0xFF00, 0x20);
    gb.step().unwrap();

    gb.press(Button::Down);
    assert_eq!(gb.mmu.if_reg & 0x10, 0x10);
    assert_eq!(gb.mmu.read_byte(0xFF00) & 0x0F, 0x07);

    gb.step().unwrap();
    assert_eq!(gb.cpu.pc(), 0x0060);

    gb.release(Button::Down);
    assert_eq!(gb.mmu.read_byte(0xFF00) & 0x0F, 0x0F);
}

#[test]
fn held_button_does_not_retrigger() {
    let mut gb = machine_with_program(&[]);
    gb.mmu.write_byte(0xFF00, 0x10);
    gb.press(Button::A);
    gb.mmu.if_reg = 0;
    gb.press(Button::A);
    assert_eq!(gb.mmu.if_reg, 0);
    assert!(gb.mmu.joypad.is_pressed(Button::A));
}
