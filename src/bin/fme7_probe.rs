use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use cathode8_mapper::nes::mapper::fme7::FME7_MAPPER_ID;
use cathode8_mapper::nes::{BankMap, Cartridge, MapperRegistry, NTSC_FRAME_CYCLES, NesTime};
use log::{debug, info};
use serde::Serialize;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone)]
struct Config {
    script: Option<PathBuf>,
    mapper_id: u16,
    frame_cycles: NesTime,
    load: Option<PathBuf>,
    save: Option<PathBuf>,
    json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script: None,
            mapper_id: FME7_MAPPER_ID,
            frame_cycles: NTSC_FRAME_CYCLES,
            load: None,
            save: None,
            json: false,
        }
    }
}

fn parse_args() -> Result<Config> {
    let mut cfg = Config::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--script" => {
                let value = args
                    .next()
                    .context("--script requires a path, e.g. --script scripts/irq_countdown.fme7")?;
                cfg.script = Some(PathBuf::from(value));
            }
            "--mapper" => {
                let value = args
                    .next()
                    .context("--mapper requires an iNES mapper number, e.g. --mapper 69")?;
                cfg.mapper_id = value
                    .parse::<u16>()
                    .with_context(|| format!("invalid --mapper value: {value}"))?;
            }
            "--frame-cycles" => {
                let value = args
                    .next()
                    .context("--frame-cycles requires an integer, e.g. --frame-cycles 29781")?;
                cfg.frame_cycles = value
                    .parse::<NesTime>()
                    .with_context(|| format!("invalid --frame-cycles value: {value}"))?;
                if cfg.frame_cycles <= 0 {
                    bail!("--frame-cycles must be positive, got {value}");
                }
            }
            "--load" => {
                let value = args.next().context("--load requires a save state path")?;
                cfg.load = Some(PathBuf::from(value));
            }
            "--save" => {
                let value = args.next().context("--save requires a save state path")?;
                cfg.save = Some(PathBuf::from(value));
            }
            "--json" => cfg.json = true,
            "--help" | "-h" => {
                println!(
                    "fme7_probe\n\n\
Usage:\n\
  cargo run --bin fme7_probe -- --script <path> [options]\n\n\
Options:\n\
  --script <path>       Register write script (required unless --load is given)\n\
  --mapper <n>          iNES mapper number (default 69)\n\
  --frame-cycles <n>    CPU cycles per frame (default 29781)\n\
  --load <path>         Start from a saved mapper state\n\
  --save <path>         Write the final mapper state\n\
  --json                Print the report as JSON\n\
  -h, --help            Show this help\n\n\
Script lines:\n\
  w <cycle> <addr> <value>   CPU write, addr/value in hex ($A000, 0xA000 or A000)\n\
  run <cycle>                Advance the mapper clock\n\
  frame                      End the frame and rebase the clock\n\
  # ...                      Comment\n"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    if cfg.script.is_none() && cfg.load.is_none() {
        bail!("nothing to do: pass --script and/or --load (see --help)");
    }
    Ok(cfg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Write { time: NesTime, addr: u16, data: u8 },
    Run(NesTime),
    Frame,
}

#[derive(Debug, Clone, Copy)]
struct ScriptLine {
    line: usize,
    step: Step,
}

fn parse_hex(text: &str) -> Result<u32> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).with_context(|| format!("invalid hex value: {text}"))
}

fn parse_time(text: &str) -> Result<NesTime> {
    text.parse::<NesTime>()
        .with_context(|| format!("invalid cycle: {text}"))
}

fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut steps = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let fields: Vec<&str> = text.split_whitespace().collect();
        let step = match fields.as_slice() {
            ["w", time, addr, value] => Step::Write {
                time: parse_time(time).with_context(|| format!("line {line}"))?,
                addr: u16::try_from(parse_hex(addr).with_context(|| format!("line {line}"))?)
                    .with_context(|| format!("line {line}: address out of range: {addr}"))?,
                data: u8::try_from(parse_hex(value).with_context(|| format!("line {line}"))?)
                    .with_context(|| format!("line {line}: value out of range: {value}"))?,
            },
            ["run", time] => Step::Run(parse_time(time).with_context(|| format!("line {line}"))?),
            ["frame"] => Step::Frame,
            _ => bail!("line {line}: unrecognised command: {text}"),
        };
        steps.push(ScriptLine { line, step });
    }
    Ok(steps)
}

#[derive(Debug, Serialize)]
struct FrameReport {
    frame: u32,
    writes: usize,
    irq_asserted: bool,
    next_irq: Option<NesTime>,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    mapper_id: u16,
    mapper: &'static str,
    frame_cycles: NesTime,
    frames: Vec<FrameReport>,
    registers: String,
    banks: BankMap,
    state_base64: String,
    state_sha1: String,
}

fn finish_frame(cart: &mut Cartridge, cfg: &Config, frame: u32, writes: usize) -> FrameReport {
    cart.run_until(cfg.frame_cycles);
    let irq_asserted = cart.next_irq(cfg.frame_cycles) == Some(cfg.frame_cycles);
    cart.end_frame(cfg.frame_cycles);
    let report = FrameReport {
        frame,
        writes,
        irq_asserted,
        next_irq: if irq_asserted { None } else { cart.next_irq(0) },
    };
    debug!("frame {} done: {}", report.frame, cart.mapper().debug_state());
    report
}

fn run_script(
    cart: &mut Cartridge,
    cfg: &Config,
    steps: &[ScriptLine],
) -> Result<Vec<FrameReport>> {
    let mut frames = Vec::new();
    let mut last_time: NesTime = 0;
    let mut writes = 0usize;
    let mut open_frame = false;

    for ScriptLine { line, step } in steps.iter().copied() {
        match step {
            Step::Write { time, addr, data } => {
                check_time(line, time, last_time, cfg.frame_cycles)?;
                cart.write(time, addr, data);
                last_time = time;
                writes += 1;
                open_frame = true;
            }
            Step::Run(time) => {
                check_time(line, time, last_time, cfg.frame_cycles)?;
                cart.run_until(time);
                last_time = time;
                open_frame = true;
            }
            Step::Frame => {
                let report = finish_frame(cart, cfg, frames.len() as u32, writes);
                frames.push(report);
                last_time = 0;
                writes = 0;
                open_frame = false;
            }
        }
    }

    if open_frame {
        let report = finish_frame(cart, cfg, frames.len() as u32, writes);
        frames.push(report);
    }
    Ok(frames)
}

fn check_time(
    line: usize,
    time: NesTime,
    last_time: NesTime,
    frame_cycles: NesTime,
) -> Result<()> {
    if time < last_time {
        bail!("line {line}: cycle {time} is earlier than the previous step at {last_time}");
    }
    if time > frame_cycles {
        bail!("line {line}: cycle {time} is past the end of the frame ({frame_cycles})");
    }
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let cfg = parse_args()?;

    let registry = MapperRegistry::default();
    let mut cart = Cartridge::new(cfg.mapper_id, &registry)?;
    info!("mapper {} ({})", cfg.mapper_id, registry.name(cfg.mapper_id));

    if let Some(path) = &cfg.load {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read save state: {}", path.display()))?;
        cart.load_state(&bytes)
            .with_context(|| format!("failed to load save state: {}", path.display()))?;
        info!("restored {} byte state from {}", bytes.len(), path.display());
    }

    let frames = match &cfg.script {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read script: {}", path.display()))?;
            let steps = parse_script(&source)
                .with_context(|| format!("failed to parse script: {}", path.display()))?;
            run_script(&mut cart, &cfg, &steps)?
        }
        None => Vec::new(),
    };

    let state = cart.save_state();
    if let Some(path) = &cfg.save {
        fs::write(path, &state)
            .with_context(|| format!("failed to write save state: {}", path.display()))?;
        info!("saved {} byte state to {}", state.len(), path.display());
    }

    let report = ProbeReport {
        mapper_id: cart.mapper_id(),
        mapper: cart.mapper_name(),
        frame_cycles: cfg.frame_cycles,
        frames,
        registers: cart.mapper().debug_state(),
        banks: cart.banks().clone(),
        state_base64: BASE64_STANDARD.encode(&state),
        state_sha1: format!("{:x}", Sha1::digest(&state)),
    };

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} (mapper {})", report.mapper, report.mapper_id);
    for frame in &report.frames {
        let irq = match (frame.irq_asserted, frame.next_irq) {
            (true, _) => "asserted".to_string(),
            (false, Some(at)) => format!("next at cycle {at}"),
            (false, None) => "idle".to_string(),
        };
        println!(
            "- frame {:03}: writes={} irq={}",
            frame.frame, frame.writes, irq
        );
    }
    println!();
    println!("{}", report.registers);
    println!("state:  {}", report.state_base64);
    println!("sha1:   {}", report.state_sha1);
    Ok(())
}
