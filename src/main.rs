/*
 * This file is part of hddsaver.
 *
 * Copyright (C) 2025 hddsaver contributors
 *
 * hddsaver is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hddsaver is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hddsaver. If not, see <https://www.gnu.org/licenses/>.
 */

mod cli;

use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

use hddsaver::board::BoardIdentity;
use hddsaver::config::{config_path, load_config};
use hddsaver::driver::Driver;
use hddsaver::host::{DevPort, LockFileRegions};
use hddsaver::logger;
use hddsaver::port::Bus;

use cli::{Cli, Command};

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Prefer journald when running under systemd, stderr otherwise
    if std::path::Path::new("/run/systemd/journal/socket").exists() {
        if let Ok(journald) = tracing_journald::layer() {
            use tracing_subscriber::prelude::*;
            tracing_subscriber::registry().with(journald).with(filter()).init();
            return;
        }
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter())
        .init();
}

/// Process exit status for a negative errno, kept within 1..=255
fn errno_exit_code(rc: isize) -> i32 {
    rc.unsigned_abs().clamp(1, 255) as i32
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg_path = cli.config.clone().unwrap_or_else(config_path);
    let cfg = load_config(&cfg_path).with_context(|| format!("loading {}", cfg_path.display()))?;
    init_tracing(&cfg.log_level);

    if cli.logging {
        logger::init_logging();
        logger::log_event("startup", json!({ "config": cfg_path }));
    }

    // SAFETY: geteuid has no preconditions.
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: hddsaver needs root to access I/O ports.");
        eprintln!("Please run with: sudo {}", std::env::args().next().unwrap_or_else(|| "hddsaver".to_string()));
        process::exit(1);
    }

    let board = BoardIdentity::from_dmi_dir(&cfg.dmi_dir);
    let port = DevPort::open(&cfg.port_device).context("opening port device")?;
    let regions = LockFileRegions::new(&cfg.lock_dir).context("preparing lock directory")?;
    let bus = Bus::new(Arc::new(port), Arc::new(regions));

    let mut driver = match Driver::init(bus, board, cfg.activation_options()) {
        Ok(driver) => driver,
        Err(e) => {
            logger::log_event("probe_failed", json!({ "error": e.to_string(), "errno": e.errno() }));
            eprintln!("hddsaver: {}", e);
            process::exit(1);
        }
    };

    if let Some(dev) = driver.device() {
        logger::log_event(
            "probe",
            json!({
                "chip": dev.kind().name(),
                "sio_addr": dev.sio_addr(),
                "hwm_base": dev.descriptor().hwm_base,
                "board": driver.board().to_string(),
                "have_feature": dev.have_feature(),
            }),
        );
    }

    let code = match cli.command {
        Command::Probe => {
            if let Some(dev) = driver.device() {
                let snap = dev.snapshot();
                println!("chip:        {}", dev.kind());
                println!("super-i/o:   {:#x}", dev.sio_addr());
                println!("hwm base:    {:#x}", dev.descriptor().hwm_base);
                println!("board:       {}", driver.board());
                println!("hdd saver:   {}", if snap.have_feature { "present" } else { "absent" });
            }
            print!("state:       {}", driver.show());
            0
        }
        Command::Status => {
            print!("{}", driver.show());
            0
        }
        Command::Set { value } => {
            let before = driver.show();
            let rc = driver.store(&value);
            let after = driver.show();
            logger::log_event(
                "toggle",
                json!({ "request": value, "from": before.trim(), "to": after.trim(), "rc": rc }),
            );
            if rc < 0 {
                error!("set {:?} failed with {}", value, rc);
                eprintln!("hddsaver: set {:?} failed: errno {}", value, rc);
                errno_exit_code(rc)
            } else {
                info!("HDD Saver: {}", after.trim());
                println!("{}", rc);
                0
            }
        }
        Command::Suspend => {
            let rc = driver.suspend();
            logger::log_event("suspend", json!({ "status": rc }));
            i32::from(rc != 0)
        }
        Command::Resume => {
            let rc = driver.resume();
            logger::log_event("resume", json!({ "status": rc }));
            i32::from(rc != 0)
        }
    };

    driver.exit();
    logger::shutdown_logging();
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_exit_code() {
        assert_eq!(errno_exit_code(-(libc::EINVAL as isize)), libc::EINVAL);
        assert_eq!(errno_exit_code(-(libc::EBUSY as isize)), libc::EBUSY);
        assert_eq!(errno_exit_code(-4096), 255);
        assert_eq!(errno_exit_code(0), 1);
    }
}
