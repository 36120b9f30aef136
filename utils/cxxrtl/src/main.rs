use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use clap::Parser;
use cxxrtl::config::{Overrides, Run, RunConfig, parse_literal};
use cxxrtl::{BigUint, Handle, Library, LibraryOptions, Object, ObjectType, Vcd};
use log::{debug, info};

#[derive(Parser)]
#[command(name = "cxxrtl-sim")]
#[command(about = "Drive a CXXRTL simulation compiled into a shared library")]
#[command(version)]
struct Args {
    /// Shared library built from `write_cxxrtl` output
    #[arg(value_name = "LIBRARY")]
    library: Option<Utf8PathBuf>,

    /// Design name given to `write_cxxrtl -name`
    #[arg(long)]
    design: Option<String>,

    /// YAML run configuration; flags override its values
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// List all objects in the design and exit
    #[arg(long)]
    list: bool,

    /// Clock signal toggled every half cycle
    #[arg(long)]
    clock: Option<String>,

    /// Number of full clock cycles to simulate
    #[arg(long)]
    cycles: Option<u64>,

    /// Write a value before simulation starts (NAME=VALUE, decimal or 0x hex)
    #[arg(long, value_name = "NAME=VALUE", value_parser = parse_poke)]
    poke: Vec<(String, BigUint)>,

    /// Print the value of a signal after simulation
    #[arg(long, value_name = "NAME")]
    peek: Vec<String>,

    /// VCD output file
    #[arg(long)]
    vcd: Option<Utf8PathBuf>,

    /// Leave memories out of the VCD trace
    #[arg(long)]
    no_memories: bool,

    /// VCD timescale (e.g. "1 ns")
    #[arg(long)]
    timescale: Option<String>,
}

fn parse_poke(s: &str) -> Result<(String, BigUint), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    let value = parse_literal(value).map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.to_owned(), value))
}

impl Args {
    fn resolve(self) -> Result<Run> {
        let config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        config.merge(Overrides {
            library: self.library,
            design: self.design,
            clock: self.clock,
            cycles: self.cycles,
            pokes: self.poke,
            peeks: self.peek,
            vcd: self.vcd,
            no_memories: self.no_memories,
            timescale: self.timescale,
        })
    }
}

fn require_parts<'h>(sim: &'h Handle<'_>, name: &str) -> Result<&'h [Object]> {
    sim.get_parts(name)?
        .ok_or_else(|| anyhow!("Missing required signal: {name}"))
}

/// Inputs are wires whose new value is latched on the next step; everything
/// else is written in place.
fn drive(object: &Object, value: &BigUint) -> cxxrtl::Result<()> {
    if object.has_next() {
        object.set_next(value)
    } else {
        object.set_curr(value)
    }
}

fn write_signal(sim: &Handle<'_>, name: &str, value: &BigUint) -> Result<()> {
    for part in require_parts(sim, name)? {
        drive(part, value).with_context(|| format!("Failed to write {name}"))?;
    }
    Ok(())
}

fn read_signal(sim: &Handle<'_>, name: &str) -> Result<BigUint> {
    require_parts(sim, name)?
        .iter()
        .try_fold(BigUint::default(), |value, part| {
            Ok::<_, anyhow::Error>(value | part.curr()?)
        })
}

fn list_objects(sim: &Handle<'_>) {
    let mut objects = Vec::new();
    sim.enumerate(|name, parts| {
        for (index, part) in parts.iter().enumerate() {
            let label = if parts.len() > 1 {
                format!("{name}[{index}]")
            } else {
                name.to_owned()
            };
            objects.push((label, part.kind(), part.width(), part.lsb_at(), part.depth()));
        }
    });
    objects.sort_by(|a, b| a.0.cmp(&b.0));

    println!("Objects:");
    for (name, kind, width, lsb_at, depth) in objects {
        let kind = match kind {
            ObjectType::Value => "value".to_owned(),
            ObjectType::Wire => "wire".to_owned(),
            ObjectType::Memory => "memory".to_owned(),
            ObjectType::Alias => "alias".to_owned(),
            ObjectType::Unknown(ty) => format!("type {ty}"),
        };
        if depth > 1 {
            println!("  {name}: {kind} [{width}] x {depth}");
        } else if lsb_at > 0 {
            println!("  {name}: {kind} [{}:{lsb_at}]", lsb_at + width - 1);
        } else {
            println!("  {name}: {kind} [{width}]");
        }
    }
}

fn flush_trace(vcd: &mut Vcd<'_>, out: &mut BufWriter<File>) -> Result<()> {
    vcd.read_into(out).context("Failed to write VCD output")?;
    Ok(())
}

fn advance(sim: &Handle<'_>, trace: &mut Option<(Vcd<'_>, BufWriter<File>)>, time: &mut u64) {
    sim.step();
    *time += 1;
    if let Some((vcd, _)) = trace.as_mut() {
        vcd.sample(*time);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let list = args.list;
    let run = args.resolve()?;

    let options = LibraryOptions::default().design_name(run.design.clone());
    // SAFETY: the user asked for this library to be loaded; its exports are
    // trusted to follow the CXXRTL C API.
    let library = unsafe { Library::open_with(&run.library, options) }
        .with_context(|| format!("Failed to load {}", run.library))?;
    let sim = library
        .instantiate()
        .with_context(|| format!("Failed to instantiate design {}", run.design))?;

    if list {
        list_objects(&sim);
        return Ok(());
    }

    for (name, value) in &run.pokes {
        debug!("poke {name} = {value:#x}");
        write_signal(&sim, name, value)?;
    }

    let clock = run
        .clock
        .as_deref()
        .map(|name| require_parts(&sim, name))
        .transpose()?;

    let mut trace = match &run.trace {
        Some(trace) => {
            let mut vcd = library.vcd_create()?;
            if let Some((number, unit)) = &trace.timescale {
                vcd.timescale(*number, unit)?;
            }
            if trace.memories {
                vcd.add_from(&sim);
            } else {
                vcd.add_from_without_memories(&sim);
            }
            let file = File::create(&trace.path)
                .with_context(|| format!("Failed to create {}", trace.path))?;
            Some((vcd, BufWriter::new(file)))
        }
        None => None,
    };

    let mut time = 0u64;
    sim.step();
    if let Some((vcd, out)) = trace.as_mut() {
        vcd.sample(time);
        flush_trace(vcd, out)?;
    }

    let levels = [BigUint::from(1u32), BigUint::from(0u32)];
    for cycle in 0..run.cycles {
        match clock {
            Some(clock) => {
                for level in &levels {
                    for part in clock {
                        drive(part, level)?;
                    }
                    advance(&sim, &mut trace, &mut time);
                }
            }
            None => advance(&sim, &mut trace, &mut time),
        }
        if let Some((vcd, out)) = trace.as_mut() {
            flush_trace(vcd, out)?;
        }
        if cycle % 1000 == 999 {
            info!("simulated {} cycles", cycle + 1);
        }
    }

    if let Some((mut vcd, mut out)) = trace.take() {
        flush_trace(&mut vcd, &mut out)?;
        out.flush()?;
        vcd.destroy();
        if let Some(trace) = &run.trace {
            println!("Wrote {}", trace.path);
        }
    }

    for name in &run.peeks {
        let value = read_signal(&sim, name)?;
        println!("{name} = {value:#x}");
    }

    println!("Simulated {} cycles", run.cycles);
    Ok(())
}
