use std::path::{Path, PathBuf};

use clap::ValueEnum;
use cyclegb_core::RtcClock;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RtcMode {
    #[default]
    Wall,
    Emulated,
}

impl From<RtcMode> for RtcClock {
    fn from(mode: RtcMode) -> Self {
        match mode {
            RtcMode::Wall => RtcClock::Wall,
            RtcMode::Emulated => RtcClock::Emulated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub frames: u64,
    pub rtc: RtcMode,
    pub breakpoints: Vec<u16>,
    /// Stop at the first breakpoint instead of reporting it and carrying on.
    pub stop_on_break: bool,
    /// Directory for `.sav` files. Next to the ROM when unset.
    pub save_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frames: 60,
            rtc: RtcMode::default(),
            breakpoints: Vec::new(),
            stop_on_break: false,
            save_dir: None,
        }
    }
}

impl RunConfig {
    /// Battery save location for `rom`.
    pub fn save_path_for(&self, rom: &Path) -> PathBuf {
        let file = rom.with_extension("sav");
        match (&self.save_dir, file.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => file,
        }
    }
}

pub fn load_from_file(path: &Path) -> RunConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to read config {}: {e}; using defaults", path.display());
            return RunConfig::default();
        }
    };

    match toml::from_str::<RunConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            RunConfig::default()
        }
    }
}
