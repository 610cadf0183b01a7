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

//! Device lifecycle: discovery, activation, suspend/resume and removal.
//!
//! ```text
//! Unprobed -> Discovering -> Activating -> Ready <-> Suspended
//!                                            |
//!                                            v
//!                                         Removed
//! ```
//!
//! Discovering and Activating only exist for the duration of
//! [`Lifecycle::probe`]; a failed probe leaves the lifecycle `Unprobed` with
//! nothing reserved.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use hs_error::{HddSaverError, Result};

use crate::board::BoardIdentity;
use crate::chip::{self, DeviceDescriptor};
use crate::constants::{ioregion, sio, timing, BANK_UNKNOWN, DRVNAME, MAX_RETRIES};
use crate::device::{on_off, Device, DeviceState};
use crate::port::{Bus, Region};
use crate::superio::LogicalDevice;

/// Knobs for discovery and activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOptions {
    /// Super-I/O index ports to scan, in order
    pub addresses: Vec<u16>,
    /// Sleep between region reservation attempts
    pub retry_delay: Duration,
    /// Age after which the cached toggle state is re-read
    pub refresh_interval: Duration,
}

impl Default for ActivationOptions {
    fn default() -> Self {
        Self {
            addresses: vec![sio::ADDR_PRIMARY],
            retry_delay: timing::RETRY_DELAY,
            refresh_interval: timing::REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unprobed,
    Discovering,
    Activating,
    Ready,
    Suspended,
    Removed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unprobed => "unprobed",
            Phase::Discovering => "discovering",
            Phase::Activating => "activating",
            Phase::Ready => "ready",
            Phase::Suspended => "suspended",
            Phase::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Where the single HDD Saver device is in its life
#[derive(Debug, Default)]
pub enum Lifecycle {
    #[default]
    Unprobed,
    Ready(Device),
    Suspended(Device),
    Removed,
}

impl Lifecycle {
    pub fn phase(&self) -> Phase {
        match self {
            Lifecycle::Unprobed => Phase::Unprobed,
            Lifecycle::Ready(_) => Phase::Ready,
            Lifecycle::Suspended(_) => Phase::Suspended,
            Lifecycle::Removed => Phase::Removed,
        }
    }

    pub fn device(&self) -> Option<&Device> {
        match self {
            Lifecycle::Ready(dev) | Lifecycle::Suspended(dev) => Some(dev),
            _ => None,
        }
    }

    /// Discovers and activates the device. Only acts on `Unprobed`.
    pub fn probe(self, bus: &Bus, board: &BoardIdentity, opts: &ActivationOptions) -> (Self, Result<()>) {
        if !matches!(self, Lifecycle::Unprobed) {
            return (self, Ok(()));
        }

        transition(Phase::Unprobed, Phase::Discovering);
        let desc = match discover(bus, &opts.addresses, opts.retry_delay) {
            Ok(desc) => desc,
            Err(e) => return (Lifecycle::Unprobed, Err(e)),
        };

        transition(Phase::Discovering, Phase::Activating);
        match activate(bus, desc, board, opts) {
            Ok(dev) => {
                transition(Phase::Activating, Phase::Ready);
                (Lifecycle::Ready(dev), Ok(()))
            }
            Err(e) => (Lifecycle::Unprobed, Err(e)),
        }
    }

    pub fn suspend(self) -> (Self, Result<()>) {
        match self {
            Lifecycle::Ready(dev) => {
                warn!("Entering suspend mode");
                dev.suspend();
                transition(Phase::Ready, Phase::Suspended);
                (Lifecycle::Suspended(dev), Ok(()))
            }
            other => (other, Ok(())),
        }
    }

    /// Resynchronizes the chip after sleep.
    ///
    /// The device returns to `Ready` even when the chip could not be reached;
    /// the error is handed back for the caller to report.
    pub fn resume(self) -> (Self, Result<()>) {
        let from = self.phase();
        match self {
            Lifecycle::Ready(dev) | Lifecycle::Suspended(dev) => {
                warn!("Resuming from suspend");
                let res = dev.resume();
                if let Err(e) = &res {
                    warn!("Resume of {} at {:#x} failed: {}", dev.kind(), dev.sio_addr(), e);
                }
                transition(from, Phase::Ready);
                (Lifecycle::Ready(dev), res)
            }
            other => (other, Ok(())),
        }
    }

    /// Unbinds the device. The HDD Saver pin keeps its last state.
    pub fn remove(self) -> Self {
        if let Some(dev) = self.device() {
            debug!("Removing {} at {:#x}", dev.kind(), dev.sio_addr());
        }
        Lifecycle::Removed
    }
}

fn transition(from: Phase, to: Phase) {
    debug!(%from, %to, "lifecycle transition");
}

/// Runs `op` until it stops reporting `Busy`, at most `MAX_RETRIES` times.
///
/// Sleeps `retry_delay` between attempts. No device lock exists yet when this
/// runs, so nothing is held across the sleep except what `op` itself keeps on
/// success.
pub fn retry_busy<T>(retry_delay: Duration, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                warn!("Retrying chip access");
                thread::sleep(retry_delay);
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                warn!("Chip is busy");
                return Err(e);
            }
            res => return res,
        }
    }
}

/// Scans `addresses` for a supported chip, retrying each one while its
/// index/data ports are held elsewhere
pub fn discover(bus: &Bus, addresses: &[u16], retry_delay: Duration) -> Result<DeviceDescriptor> {
    let mut busy = None;
    for &addr in addresses {
        match retry_busy(retry_delay, || chip::identify(bus, addr)) {
            Ok(desc) => return Ok(desc),
            Err(e @ HddSaverError::Busy { .. }) => {
                debug!("Super-I/O at {:#x} is busy", addr);
                busy = Some(e);
            }
            Err(HddSaverError::NotFound(msg)) => debug!("{}", msg),
            Err(e) => return Err(e),
        }
    }
    Err(busy.unwrap_or_else(|| HddSaverError::not_found("no HDD Saver capable Super-I/O chip found")))
}

/// Claims the hardware monitor window, retrying while another driver holds it
pub fn reserve_region(bus: &Bus, start: u16, retry_delay: Duration) -> Result<Region> {
    retry_busy(retry_delay, || bus.request_region(start, ioregion::LENGTH, DRVNAME))
}

/// Builds the device for an identified chip.
///
/// Nothing is published on failure: the region is released and no device
/// state exists.
pub fn activate(bus: &Bus, desc: DeviceDescriptor, board: &BoardIdentity, opts: &ActivationOptions) -> Result<Device> {
    if !desc.kind.is_supported() {
        warn!("Incompatible chipset found: {}", desc.kind);
        return Err(HddSaverError::Unsupported(desc.kind.to_string()));
    }

    let region = reserve_region(bus, desc.hwm_window_start(), opts.retry_delay)?;

    let sio = retry_busy(opts.retry_delay, move || bus.enter(desc.sio_addr))?;
    sio.select(LogicalDevice::Hwm)?;
    let sio_reg_enable = sio.inb(sio::REG_ENABLE)?;
    let have_feature = chip::hddsaver_present(&sio, board)?;
    let feature_status = if have_feature {
        info!("HDD Saver found");
        chip::read_hddsaver_bit(&sio)?
    } else {
        false
    };
    sio.exit()?;

    if have_feature {
        info!("HDD Saver is {}", on_off(feature_status));
    } else {
        info!("HDD Saver not available on {}", board);
    }

    Ok(Device::new(
        bus.clone(),
        desc,
        region,
        opts.refresh_interval,
        DeviceState {
            valid: true,
            last_updated: Some(Instant::now()),
            bank: BANK_UNKNOWN,
            have_feature,
            feature_status,
            sio_reg_enable,
        },
    ))
}
