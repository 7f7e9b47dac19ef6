use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cyclegb_core::{FrameOutcome, GameBoy};
use log::{info, warn};

use crate::config::RunConfig;

/// A breakpoint the run stopped on, with the CPU state at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub pc: u16,
    pub state: String,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub frames: u64,
    pub hits: Vec<Hit>,
    pub stopped_early: bool,
}

pub struct Session {
    pub gb: GameBoy,
    save_path: Option<PathBuf>,
}

impl Session {
    /// Build a machine for `rom_path`, restoring its battery save if one
    /// exists. `save_override` replaces the configured save location.
    pub fn open(
        rom_path: &Path,
        cfg: &RunConfig,
        save_override: Option<PathBuf>,
    ) -> Result<Self> {
        let rom = std::fs::read(rom_path)
            .with_context(|| format!("failed to read ROM {}", rom_path.display()))?;

        let mut gb = GameBoy::new_with_rtc_clock(cfg.rtc.into());
        gb.load_rom(rom);
        for &addr in &cfg.breakpoints {
            gb.breakpoints.add(addr);
        }

        let battery = gb
            .mmu
            .cart
            .as_ref()
            .is_some_and(|cart| cart.header().battery);
        let save_path =
            battery.then(|| save_override.unwrap_or_else(|| cfg.save_path_for(rom_path)));

        if let Some(path) = save_path.as_deref()
            && path.exists()
        {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read save {}", path.display()))?;
            gb.load_sram(&data)
                .with_context(|| format!("save {} does not fit this cartridge", path.display()))?;
            info!("Loaded save {}", path.display());
        }

        Ok(Self { gb, save_path })
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Run `frames` complete frames. Breakpoint hits are recorded and, unless
    /// `stop_on_break` is set, execution resumes past them.
    pub fn run(&mut self, frames: u64, stop_on_break: bool) -> Result<Summary> {
        let mut summary = Summary::default();
        while summary.frames < frames {
            match self.gb.run_frame()? {
                FrameOutcome::Complete => summary.frames += 1,
                FrameOutcome::Breakpoint(pc) => {
                    let state = self.gb.cpu.debug_state();
                    info!("Breakpoint {pc:04X}: {state}");
                    summary.hits.push(Hit { pc, state });
                    if stop_on_break {
                        summary.stopped_early = true;
                        break;
                    }
                    self.gb.resume();
                }
                FrameOutcome::Paused(_) => self.gb.resume(),
            }
        }
        Ok(summary)
    }

    /// Write battery RAM back to disk. Carts without a battery have nothing
    /// to write.
    pub fn write_save(&self) -> Result<()> {
        let Some(path) = self.save_path.as_deref() else {
            return Ok(());
        };
        let data = self.gb.save_sram();
        if data.is_empty() {
            warn!("Battery cartridge has no RAM to save");
            return Ok(());
        }
        std::fs::write(path, &data)
            .with_context(|| format!("failed to write save {}", path.display()))?;
        info!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}
