//! Instruction-level Game Boy (DMG) emulation core.
//!
//! The CPU drives everything: each memory access charges its cycles through
//! [`mmu::Mmu::update`], which steps the timer, the cartridge clock and the
//! video/audio register blocks before the access returns. Frontends drive the
//! core through the [`gameboy`] facade.

/// CPU clock in Hz.
pub const CPU_FREQUENCY: u32 = 4_194_304;

/// Sound register block and the audio collaborator trait.
pub mod apu;

/// Execution breakpoints.
pub mod breakpoints;

/// Cartridge header, MBC1/MBC3 banking, MBC3 clock and battery saves.
pub mod cartridge;

/// LR35902 CPU core.
pub mod cpu;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Joypad register and press-triggered interrupt.
pub mod joypad;

/// Memory map and the clock sink.
pub mod mmu;

/// LCD register block and the video collaborator trait.
pub mod ppu;

/// Register file with paired 16-bit views.
pub mod registers;

/// Divider/timer unit.
pub mod timer;

pub use cartridge::{Cartridge, RtcClock, SaveError};
pub use cpu::{CpuError, FrameOutcome};
pub use gameboy::GameBoy;
pub use joypad::Button;
