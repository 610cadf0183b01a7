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

//! Register offsets, key sequences and timing for the NCT6791 Super-I/O.
//!
//! Nothing here is configurable at runtime: the offsets are fixed by the chip
//! and the board allow-list is a safety gate, not a preference.

use std::time::Duration;

/// Name used when claiming I/O regions
pub const DRVNAME: &str = "hddsaver";

/// Legacy Super-I/O index port addresses
pub mod sio {
    pub const ADDR_PRIMARY: u16 = 0x2e;
    pub const ADDR_SECONDARY: u16 = 0x4e;

    /// Index and data ports
    pub const PORT_COUNT: u16 = 2;

    /// Extended function mode key, written twice to the index port
    pub const ENTER_KEY: u8 = 0x87;
    pub const EXIT_KEY: u8 = 0xaa;
    /// Config control register; writing `EXIT_WAIT_FOR_KEY` returns to wait-for-key state
    pub const REG_CONFIG_CONTROL: u8 = 0x02;
    pub const EXIT_WAIT_FOR_KEY: u8 = 0x02;

    pub const REG_LDSEL: u8 = 0x07;
    /// Device ID, 2 bytes
    pub const REG_DEVID: u8 = 0x20;
    /// Global option byte carrying the HDD Saver strap
    pub const REG_GLOBAL_OPTION: u8 = 0x2a;
    pub const REG_ENABLE: u8 = 0x30;
    /// Logical device base address, 2 bytes
    pub const REG_ADDR: u8 = 0x60;

    pub const ID_MASK: u16 = 0xfff8;
    /// Value read back when nothing answers on the bus
    pub const ID_FLOATING: u16 = 0xffff;

    pub const ENABLE_BIT: u8 = 0x01;
    pub const HDDSAVER_STRAP_BIT: u8 = 1 << 6;
}

/// Logical device numbers
pub mod ld {
    pub const GPIO_DATA: u8 = 0x08;
    pub const HWM: u8 = 0x0b;
}

/// GPIO bank registers (logical device 8)
pub mod gpio {
    pub const REG_GPIO1_DATA: u8 = 0xf1;
    /// GPIO10 drives the HDD Saver power switch
    pub const HDDSAVER_BIT: u8 = 1 << 0;
}

/// NCT6791 specific registers (hardware monitor logical device)
pub mod nct6791 {
    pub const REG_HM_IO_SPACE_LOCK_ENABLE: u8 = 0x28;
    pub const IO_SPACE_LOCK_BIT: u8 = 0x10;
}

/// Hardware monitor I/O window
pub mod ioregion {
    pub const ALIGNMENT: u16 = !7;
    pub const OFFSET: u16 = 5;
    pub const LENGTH: u16 = 2;
}

/// Register bank sentinel forcing explicit reselection
pub const BANK_UNKNOWN: u8 = 0xff;

/// Region reservation attempts during activation
pub const MAX_RETRIES: u32 = 5;

pub mod timing {
    use super::Duration;

    /// Sleep between region reservation attempts
    pub const RETRY_DELAY: Duration = Duration::from_millis(100);
    /// Cached toggle state older than this is refreshed from the chip
    pub const REFRESH_INTERVAL: Duration = Duration::from_millis(1500);
}

/// Boards whose GPIO10 is known to drive the HDD Saver switch
pub mod boards {
    pub const VENDOR: &str = "ASRock";
    pub const MODELS: &[&str] = &["Z97 Extreme4", "Z97 Extreme6", "X99 Extreme4/3.1"];
}

/// Host paths
pub mod paths {
    pub const PORT_DEVICE: &str = "/dev/port";
    pub const LOCK_DIR: &str = "/run/lock";
    pub const DMI_DIR: &str = "/sys/devices/virtual/dmi/id";
    pub const CONFIG_FILE: &str = "/etc/hddsaver/config.json";
    pub const EVENT_LOG: &str = "/var/log/hddsaver/events.json";
}
