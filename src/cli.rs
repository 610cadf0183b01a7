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

//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hddsaver")]
#[command(version)]
#[command(about = "Control the ASRock HDD Saver switch on NCT6791D boards")]
#[command(long_about = "Control the ASRock HDD Saver switch on NCT6791D boards

HDD Saver is a GPIO on the board's Nuvoton Super-I/O chip that cuts power to
the SATA ports wired to it. It is only touched on boards known to route
GPIO10 to the switch (ASRock Z97 Extreme4, Z97 Extreme6, X99 Extreme4/3.1).

EXAMPLES:
    hddsaver probe          Show the detected chip and switch state
    hddsaver status         Print On or Off
    hddsaver set off        Switch HDD Saver off
    hddsaver resume         Re-check chip state after sleep (systemd-sleep hook)

ENVIRONMENT VARIABLES:
    RUST_LOG=debug          Enable debug logging
    HDDSAVER_CONFIG=PATH    Use another configuration file

FILES:
    /etc/hddsaver/config.json         Configuration
    /var/log/hddsaver/events.json     Event log (with --logging)")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append events to the JSON event log
    #[arg(long)]
    pub logging: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect the chip and report what was found
    Probe,
    /// Print the current HDD Saver state (On/Off)
    Status,
    /// Switch HDD Saver on or off
    Set {
        /// Boolean token: on/off, 1/0, yes/no, true/false
        value: String,
    },
    /// Suspend hook
    Suspend,
    /// Resume hook: re-apply the hardware monitor enable and I/O mapping
    ///
    /// Each invocation activates the chip afresh, and activation already
    /// enables the hardware monitor and clears the I/O space lock. Resume then
    /// only re-checks both registers and marks the cached switch state stale;
    /// it is kept so a systemd-sleep hook can call it after wake-up.
    Resume,
}
