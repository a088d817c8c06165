//! The motion controller host binary: loads an INI configuration, builds a
//! [`scheduler::Scheduler`] over an in-process [`tg_sim::SimHal`], and
//! drives its task sequence from either an interactive stdin stream or a
//! batch file.
//!
//! Grounded on the teacher's `main.rs` (`Cli`/`Commands::{Run,Batch}`,
//! `tracing_subscriber::fmt::init`), but reworked from the teacher's
//! actix/tokio multi-task server into a single synchronous loop: the
//! controller's concurrency model *is* the cooperative super-loop, so
//! there's nothing left for an async runtime to schedule around it.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod batch;
mod config;
mod gcode_io;
mod safety;
mod scheduler;

use config::MachineConfig;
use scheduler::Scheduler;

/// A motion controller host process, TinyG-protocol compatible.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller against stdin/stdout, TinyG console style.
    Run(RunArgs),
    /// Process a G-code file in one pass and print the resulting status
    /// reports, without an interactive session.
    Batch(batch::BatchArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the machine configuration file.
    #[arg(short, long, default_value = "machine.cfg")]
    config_path: PathBuf,

    /// Print a status report after every applied line, TinyG `$sr` style.
    #[arg(long)]
    verbose_status: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Batch(args) => batch::run_batch_processing(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    info!("Loading configuration from: {:?}", args.config_path);
    let cfg = MachineConfig::load(&args.config_path)?;

    let hal = tg_sim::SimHal::new(2, cfg.mcu.timer_tick_hz);
    let mut sched: Scheduler<tg_sim::SimHal, 1> = Scheduler::new(
        cfg.axes,
        cfg.mcu.steps_per_mm,
        cfg.planner.segment_time_s,
        hal,
        [0],
        cfg.mcu.probe_input,
    );

    info!("Controller ready, reading G-code from stdin.");
    let stdin = io::stdin();
    let mut scratch = [0u8; 256];
    for line in stdin.lock().lines() {
        let raw = line?;
        let scan_result: tg_proto::realtime::ScanResult<4> =
            tg_proto::realtime::scan(raw.as_bytes(), &mut scratch);
        for cmd in scan_result.commands.iter() {
            sched.handle_realtime(*cmd);
        }
        let text = core::str::from_utf8(scan_result.line_bytes).unwrap_or("");

        loop {
            match sched.tick(Some(text)) {
                tg_core::error::Stat::Ok => continue,
                tg_core::error::Stat::Err(e) => {
                    tracing::warn!("fault: {:?}", e);
                    break;
                }
                tg_core::error::Stat::Eagain | tg_core::error::Stat::Noop => break,
            }
        }

        if args.verbose_status {
            println!("{:?}", sched.status_report());
        }
    }

    Ok(())
}
