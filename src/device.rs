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

//! Per-chip device state and the HDD Saver toggle.
//!
//! A [`Device`] exists only after activation succeeded. It owns the hardware
//! monitor I/O region for its whole lifetime and serializes every register
//! sequence behind one update lock.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use hs_error::Result;

use crate::chip::{self, ChipKind, DeviceDescriptor};
use crate::constants::{sio, BANK_UNKNOWN};
use crate::port::{Bus, Region};
use crate::superio::LogicalDevice;

/// Cached register state, guarded by the device update lock
#[derive(Debug, Clone)]
pub(crate) struct DeviceState {
    /// True if the fields below reflect the chip
    pub valid: bool,
    pub last_updated: Option<Instant>,
    /// Logical device last selected by this handle
    pub bank: u8,
    pub have_feature: bool,
    pub feature_status: bool,
    /// Hardware monitor enable register, restored on resume
    pub sio_reg_enable: u8,
}

/// Point-in-time copy of the device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub valid: bool,
    pub last_updated: Option<Instant>,
    pub bank: u8,
    pub have_feature: bool,
    pub feature_status: bool,
    pub sio_reg_enable: u8,
}

/// An activated HDD Saver device
#[derive(Debug)]
pub struct Device {
    bus: Bus,
    desc: DeviceDescriptor,
    region: Region,
    refresh_interval: Duration,
    state: Mutex<DeviceState>,
}

impl Device {
    pub(crate) fn new(
        bus: Bus,
        desc: DeviceDescriptor,
        region: Region,
        refresh_interval: Duration,
        state: DeviceState,
    ) -> Self {
        Self {
            bus,
            desc,
            region,
            refresh_interval,
            state: Mutex::new(state),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.desc
    }

    pub fn sio_addr(&self) -> u16 {
        self.desc.sio_addr
    }

    pub fn kind(&self) -> ChipKind {
        self.desc.kind
    }

    /// Start of the reserved hardware monitor window
    pub fn region_start(&self) -> u16 {
        self.region.start()
    }

    pub fn have_feature(&self) -> bool {
        self.state.lock().have_feature
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let st = self.state.lock();
        DeviceSnapshot {
            valid: st.valid,
            last_updated: st.last_updated,
            bank: st.bank,
            have_feature: st.have_feature,
            feature_status: st.feature_status,
            sio_reg_enable: st.sio_reg_enable,
        }
    }

    /// Current HDD Saver state, refreshed from the chip when the cache is stale.
    ///
    /// Never fails: if the chip cannot be reached the cached value is returned.
    pub fn read_toggle(&self) -> bool {
        let mut st = self.state.lock();
        let stale = !st.valid
            || st
                .last_updated
                .map_or(true, |t| t.elapsed() > self.refresh_interval);
        if stale {
            if st.have_feature {
                match self.read_status() {
                    Ok(status) => {
                        st.feature_status = status;
                        st.bank = LogicalDevice::GpioData.number();
                        st.valid = true;
                        st.last_updated = Some(Instant::now());
                    }
                    Err(e) => debug!("Keeping cached HDD Saver state: {}", e),
                }
            } else {
                st.valid = true;
                st.last_updated = Some(Instant::now());
            }
        }
        st.feature_status
    }

    fn read_status(&self) -> Result<bool> {
        let sio = self.bus.enter(self.desc.sio_addr)?;
        let status = chip::read_hddsaver_bit(&sio)?;
        sio.exit()?;
        Ok(status)
    }

    /// Switches HDD Saver on or off.
    ///
    /// Asking for the current state is a no-op with no bus traffic. On a board
    /// without the feature the request is accepted and ignored. On failure the
    /// cached state is left unchanged.
    pub fn write_toggle(&self, desired: bool) -> Result<()> {
        let mut st = self.state.lock();
        if desired == st.feature_status {
            return Ok(());
        }
        if !st.have_feature {
            info!("HDD Saver is not available on this board, ignoring request");
            return Ok(());
        }

        let sio = self.bus.enter(self.desc.sio_addr)?;
        chip::flip_hddsaver_bit(&sio)?;
        st.bank = LogicalDevice::GpioData.number();
        st.feature_status = desired;
        st.last_updated = Some(Instant::now());
        if let Err(e) = sio.exit() {
            warn!("HDD Saver switched but chip did not lock cleanly: {}", e);
        }

        info!("HDD Saver is {}", on_off(desired));
        Ok(())
    }

    /// Takes and releases the update lock; no register state is saved
    pub(crate) fn suspend(&self) {
        let _st = self.state.lock();
        debug!("Suspending {} at {:#x}", self.desc.kind, self.desc.sio_addr);
    }

    /// Re-applies the hardware monitor enable value and the I/O space unlock,
    /// then marks the cache stale. The cache is marked stale even if the chip
    /// could not be reached.
    pub(crate) fn resume(&self) -> Result<()> {
        let mut st = self.state.lock();
        st.bank = BANK_UNKNOWN;

        let res = self.restore_registers(st.sio_reg_enable);

        st.valid = false;
        res
    }

    fn restore_registers(&self, sio_reg_enable: u8) -> Result<()> {
        let sio = self.bus.enter(self.desc.sio_addr)?;
        sio.select(LogicalDevice::Hwm)?;
        let reg = sio.inb(sio::REG_ENABLE)?;
        if reg != sio_reg_enable {
            sio.outb(sio::REG_ENABLE, sio_reg_enable)?;
        }
        if self.desc.kind.needs_io_mapping_unlock() {
            chip::enable_io_mapping(&sio)?;
        }
        sio.exit()
    }
}

pub fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}
