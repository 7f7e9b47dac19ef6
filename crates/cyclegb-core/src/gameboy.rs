use log::debug;

use crate::{
    breakpoints::Breakpoints,
    cartridge::{Cartridge, RtcClock, SaveError},
    cpu::{Cpu, CpuError, FrameOutcome},
    joypad::Button,
    mmu::Mmu,
};

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub breakpoints: Breakpoints,
    rtc_clock: RtcClock,
    /// PC of the breakpoint the machine stopped on.
    paused_at: Option<u16>,
}

impl GameBoy {
    pub fn new() -> Self {
        Self::new_with_rtc_clock(RtcClock::default())
    }

    /// Machine whose MBC3 clocks advance by `clock`.
    pub fn new_with_rtc_clock(clock: RtcClock) -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
            breakpoints: Breakpoints::new(),
            rtc_clock: clock,
            paused_at: None,
        }
    }

    pub fn rtc_clock(&self) -> RtcClock {
        self.rtc_clock
    }

    /// Insert a cartridge built from `rom` and power-cycle.
    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.load_cart(Cartridge::new(rom, self.rtc_clock));
    }

    /// Insert an already built cartridge and power-cycle.
    pub fn load_cart(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
        self.reset();
    }

    /// Reset to the post-boot state. The cartridge, its RAM and its clock
    /// stay as they are.
    pub fn reset(&mut self) {
        debug!("Resetting machine");
        self.cpu = Cpu::new();
        self.mmu.reset();
        self.paused_at = None;
    }

    pub fn step(&mut self) -> Result<(), CpuError> {
        self.cpu.step(&mut self.mmu)
    }

    /// Run one frame unless paused on a breakpoint.
    pub fn run_frame(&mut self) -> Result<FrameOutcome, CpuError> {
        if let Some(pc) = self.paused_at {
            return Ok(FrameOutcome::Paused(pc));
        }
        let outcome = self.cpu.run_frame(&mut self.mmu, &self.breakpoints)?;
        if let FrameOutcome::Breakpoint(pc) = outcome {
            debug!("Paused at breakpoint {pc:04X}: {}", self.cpu.debug_state());
            self.paused_at = Some(pc);
        }
        Ok(outcome)
    }

    pub fn paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Leave a breakpoint pause. The instruction at the breakpoint runs
    /// before breakpoints are checked again.
    pub fn resume(&mut self) {
        if self.paused_at.take().is_some() {
            self.cpu.step_over_breakpoint();
        }
    }

    pub fn press(&mut self, button: Button) {
        self.mmu.update_input(button, true);
    }

    pub fn release(&mut self, button: Button) {
        self.mmu.update_input(button, false);
    }

    /// Battery RAM image, plus the clock block on timer carts. Empty without
    /// a cartridge.
    pub fn save_sram(&self) -> Vec<u8> {
        self.mmu
            .cart
            .as_ref()
            .map(Cartridge::save_sram)
            .unwrap_or_default()
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<(), SaveError> {
        match self.mmu.cart.as_mut() {
            Some(cart) => cart.load_sram(data),
            None if data.is_empty() => Ok(()),
            None => Err(SaveError::BadRtcBlock { len: data.len() }),
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
