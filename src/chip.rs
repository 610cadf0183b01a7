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

//! Chip identification and register-level HDD Saver helpers.
//!
//! Supports the following chip:
//!
//! Chip        chip ID   HWM LD   GPIO LD
//! nct6791d    0xc800    0x0b     0x08
//!
//! The rest of the NCT67xx family is recognized so the log can say what was
//! found, but identification only succeeds for the NCT6791D.

use std::fmt;

use tracing::{debug, error, info, warn};

use hs_error::{HddSaverError, Result};

use crate::board::BoardIdentity;
use crate::constants::{gpio, ioregion, nct6791, sio};
use crate::port::Bus;
use crate::superio::{LogicalDevice, Sio};

/// Nuvoton Super-I/O kinds, keyed by device ID with revision bits masked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipKind {
    Nct6106,
    Nct6116,
    Nct6775,
    Nct6776,
    Nct6779,
    Nct6791,
    Nct6792,
    Nct6793,
    Nct6795,
    Nct6796,
    Nct6797,
    Nct6798,
}

impl ChipKind {
    pub fn from_id(id: u16) -> Option<Self> {
        let kind = match id & sio::ID_MASK {
            0xc450 => ChipKind::Nct6106,
            0xd280 => ChipKind::Nct6116,
            0xb470 => ChipKind::Nct6775,
            0xc330 => ChipKind::Nct6776,
            0xc560 => ChipKind::Nct6779,
            0xc800 => ChipKind::Nct6791,
            0xc910 => ChipKind::Nct6792,
            0xd120 => ChipKind::Nct6793,
            0xd350 => ChipKind::Nct6795,
            0xd420 => ChipKind::Nct6796,
            0xd450 => ChipKind::Nct6797,
            0xd428 => ChipKind::Nct6798,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChipKind::Nct6106 => "nct6106",
            ChipKind::Nct6116 => "nct6116",
            ChipKind::Nct6775 => "nct6775",
            ChipKind::Nct6776 => "nct6776",
            ChipKind::Nct6779 => "nct6779",
            ChipKind::Nct6791 => "nct6791",
            ChipKind::Nct6792 => "nct6792",
            ChipKind::Nct6793 => "nct6793",
            ChipKind::Nct6795 => "nct6795",
            ChipKind::Nct6796 => "nct6796",
            ChipKind::Nct6797 => "nct6797",
            ChipKind::Nct6798 => "nct6798",
        }
    }

    /// Kinds whose HDD Saver GPIO path has been validated
    pub fn is_supported(self) -> bool {
        matches!(self, ChipKind::Nct6791)
    }

    /// Kinds that boot with the hardware monitor I/O space locked
    pub fn needs_io_mapping_unlock(self) -> bool {
        matches!(self, ChipKind::Nct6791)
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A chip found by [`identify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Super-I/O index port
    pub sio_addr: u16,
    pub kind: ChipKind,
    /// Hardware monitor base address, aligned
    pub hwm_base: u16,
}

impl DeviceDescriptor {
    /// First port of the hardware monitor index/data window
    pub fn hwm_window_start(&self) -> u16 {
        self.hwm_base + ioregion::OFFSET
    }
}

/// Looks for a supported Super-I/O chip at `addr` and prepares its hardware
/// monitor logical device.
pub fn identify(bus: &Bus, addr: u16) -> Result<DeviceDescriptor> {
    let sio = bus.enter(addr)?;

    let id = sio.inw(sio::REG_DEVID)?;
    let kind = match ChipKind::from_id(id) {
        Some(kind) if kind.is_supported() => kind,
        Some(kind) => {
            info!("Found {} (ID {:#06x}) at {:#x}, HDD Saver is not supported on it", kind, id, addr);
            return Err(HddSaverError::not_found(format!("{} at {:#x} is not supported", kind, addr)));
        }
        None => {
            if id != sio::ID_FLOATING {
                debug!("unsupported chip ID: {:#06x}", id);
            }
            return Err(HddSaverError::not_found(format!("no supported chip at {:#x}", addr)));
        }
    };

    sio.select(LogicalDevice::Hwm)?;
    let hwm_base = sio.inw(sio::REG_ADDR)? & ioregion::ALIGNMENT;
    if hwm_base == 0 {
        error!("Refusing to enable a Super-I/O device with a base I/O port 0");
        return Err(HddSaverError::not_found(format!("{} at {:#x} has no I/O base", kind, addr)));
    }

    let enable = sio.inb(sio::REG_ENABLE)?;
    if enable & sio::ENABLE_BIT == 0 {
        warn!("Forcibly enabling Super-I/O. Sensor is probably unusable.");
        sio.outb(sio::REG_ENABLE, enable | sio::ENABLE_BIT)?;
    }

    if kind.needs_io_mapping_unlock() {
        enable_io_mapping(&sio)?;
    }

    sio.exit()?;
    info!("Found {} or compatible chip at {:#x}:{:#x}", kind, addr, hwm_base);

    Ok(DeviceDescriptor {
        sio_addr: addr,
        kind,
        hwm_base,
    })
}

/// Clears the NCT6791 I/O space lock so the extended register mapping is
/// reachable. Expects the hardware monitor logical device to be selected.
///
/// A read-modify-write: calling it on an already unlocked chip writes nothing.
pub fn enable_io_mapping(sio: &Sio<'_>) -> Result<()> {
    let val = sio.inb(nct6791::REG_HM_IO_SPACE_LOCK_ENABLE)?;
    if val & nct6791::IO_SPACE_LOCK_BIT != 0 {
        info!("Enabling hardware saver logical device mappings.");
        sio.outb(nct6791::REG_HM_IO_SPACE_LOCK_ENABLE, val & !nct6791::IO_SPACE_LOCK_BIT)?;
    }
    Ok(())
}

/// Whether the HDD Saver switch is present.
///
/// The strap bit is only trusted on allow-listed boards; elsewhere GPIO10 may
/// be wired to something else entirely and the register is not even read.
pub fn hddsaver_present(sio: &Sio<'_>, board: &BoardIdentity) -> Result<bool> {
    if !board.has_hddsaver_wiring() {
        debug!("{} is not on the HDD Saver allow-list", board);
        return Ok(false);
    }
    sio.select(LogicalDevice::Hwm)?;
    let option = sio.inb(sio::REG_GLOBAL_OPTION)?;
    Ok(option & sio::HDDSAVER_STRAP_BIT != 0)
}

/// Reads the HDD Saver bit of the GPIO1 data register
pub fn read_hddsaver_bit(sio: &Sio<'_>) -> Result<bool> {
    sio.select(LogicalDevice::GpioData)?;
    let data = sio.inb(gpio::REG_GPIO1_DATA)?;
    Ok(data & gpio::HDDSAVER_BIT != 0)
}

/// Inverts the HDD Saver bit, leaving every other GPIO1 pin as it was
pub fn flip_hddsaver_bit(sio: &Sio<'_>) -> Result<()> {
    sio.select(LogicalDevice::GpioData)?;
    let data = sio.inb(gpio::REG_GPIO1_DATA)?;
    sio.outb(gpio::REG_GPIO1_DATA, data ^ gpio::HDDSAVER_BIT)
}
