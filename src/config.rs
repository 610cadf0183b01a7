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

//! Runtime configuration.
//!
//! Only host plumbing lives here. Register offsets and the board allow-list
//! are compiled in and deliberately not configurable.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hs_error::{HddSaverError, Result};

use crate::constants::{paths, sio, timing};
use crate::lifecycle::ActivationOptions;

fn default_sio_addresses() -> Vec<u16> { vec![sio::ADDR_PRIMARY] }
fn default_port_device() -> PathBuf { PathBuf::from(paths::PORT_DEVICE) }
fn default_lock_dir() -> PathBuf { PathBuf::from(paths::LOCK_DIR) }
fn default_dmi_dir() -> PathBuf { PathBuf::from(paths::DMI_DIR) }
fn default_retry_delay_ms() -> u64 { timing::RETRY_DELAY.as_millis() as u64 }
fn default_refresh_interval_ms() -> u64 { timing::REFRESH_INTERVAL.as_millis() as u64 }
fn default_log_level() -> String { "info".to_string() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaverConfig {
    /// Super-I/O index ports to scan, in order (0x2e and/or 0x4e)
    #[serde(default = "default_sio_addresses")]
    pub sio_addresses: Vec<u16>,
    #[serde(default = "default_port_device")]
    pub port_device: PathBuf,
    /// Directory for the per-port lock files
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    #[serde(default = "default_dmi_dir")]
    pub dmi_dir: PathBuf,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            sio_addresses: default_sio_addresses(),
            port_device: default_port_device(),
            lock_dir: default_lock_dir(),
            dmi_dir: default_dmi_dir(),
            retry_delay_ms: default_retry_delay_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl SaverConfig {
    pub fn activation_options(&self) -> ActivationOptions {
        ActivationOptions {
            addresses: self.sio_addresses.clone(),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(p) = env::var("HDDSAVER_CONFIG") {
        return PathBuf::from(p);
    }
    PathBuf::from(paths::CONFIG_FILE)
}

/// Loads `path`, falling back to defaults when the file does not exist
pub fn load_config(path: &Path) -> Result<SaverConfig> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SaverConfig::default()),
        Err(e) => {
            return Err(HddSaverError::Open {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let cfg: SaverConfig = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &SaverConfig) -> Result<()> {
    if cfg.sio_addresses.is_empty() {
        return Err(HddSaverError::config("sio_addresses must not be empty"));
    }
    for addr in &cfg.sio_addresses {
        if *addr != sio::ADDR_PRIMARY && *addr != sio::ADDR_SECONDARY {
            return Err(HddSaverError::config(format!(
                "sio_addresses: {:#x} is not a Super-I/O port (expected 0x2e or 0x4e)",
                addr
            )));
        }
    }
    if cfg.retry_delay_ms > 1000 {
        return Err(HddSaverError::config("retry_delay_ms must be at most 1000"));
    }
    if cfg.log_level.trim().is_empty() {
        return Err(HddSaverError::config("log_level must not be empty"));
    }
    Ok(())
}
