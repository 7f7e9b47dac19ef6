mod config;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use config::{RtcMode, RunConfig};
use session::Session;

#[derive(Parser)]
#[command(name = "cyclegb", about = "Headless DMG runner")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u64>,

    /// Breakpoint address in hex, may be repeated
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_addr)]
    breakpoints: Vec<u16>,

    /// How the cartridge clock advances
    #[arg(long, value_enum)]
    rtc: Option<RtcMode>,

    /// Battery save path, defaults to the ROM path with a .sav extension
    #[arg(long)]
    save: Option<PathBuf>,

    /// TOML file with run settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop at the first breakpoint hit
    #[arg(long)]
    stop_on_break: bool,

    /// Enable debug logging and print the final CPU state
    #[arg(long)]
    debug: bool,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('$'))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}

impl Args {
    /// Command line values override the config file.
    fn merge(&self, mut cfg: RunConfig) -> RunConfig {
        if let Some(frames) = self.frames {
            cfg.frames = frames;
        }
        if let Some(rtc) = self.rtc {
            cfg.rtc = rtc;
        }
        cfg.breakpoints.extend(&self.breakpoints);
        cfg.stop_on_break |= self.stop_on_break;
        cfg
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let cfg = args.merge(
        args.config
            .as_deref()
            .map(config::load_from_file)
            .unwrap_or_default(),
    );

    let mut session = Session::open(&args.rom, &cfg, args.save.clone())?;
    let summary = session.run(cfg.frames, cfg.stop_on_break)?;

    for hit in &summary.hits {
        println!("break {:04X}: {}", hit.pc, hit.state);
    }
    println!(
        "Ran {} of {} frames ({} breakpoint hits)",
        summary.frames,
        cfg.frames,
        summary.hits.len()
    );
    if args.debug {
        println!("{}", session.gb.cpu.debug_state());
    }

    session.write_save()?;
    info!("Done");
    Ok(())
}
