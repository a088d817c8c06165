//! Batch G-code processor: translates a file into status reports for
//! testing and analysis, without an interactive stdin session.
//!
//! Grounded on the teacher's `run_batch_processing`, kept file-per-line and
//! `println!`-reporting, but driving a [`crate::scheduler::Scheduler`]
//! instead of the teacher's direct `Kinematics::calculate_move` call.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::MachineConfig;
use crate::scheduler::Scheduler;

#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Path to the G-code file to process.
    #[arg(required = true)]
    gcode_file: PathBuf,

    /// Path to the machine configuration file.
    #[arg(short, long, default_value = "machine.cfg")]
    config_path: PathBuf,
}

pub fn run_batch_processing(args: BatchArgs) -> Result<()> {
    info!("Starting batch processing for file: {:?}", args.gcode_file);
    info!("Using config file: {:?}", args.config_path);

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

    let file = File::open(&args.gcode_file)
        .with_context(|| format!("failed to open G-code file: {:?}", args.gcode_file))?;
    let reader = BufReader::new(file);

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;

        loop {
            match sched.tick(Some(&line)) {
                tg_core::error::Stat::Ok => continue,
                tg_core::error::Stat::Err(e) => {
                    println!("[L{}] fault: {:?}", line_num + 1, e);
                    break;
                }
                tg_core::error::Stat::Eagain | tg_core::error::Stat::Noop => break,
            }
        }

        println!("[L{}] {:?}", line_num + 1, sched.status_report());
    }

    info!("Batch processing finished.");
    Ok(())
}
