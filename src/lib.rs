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

//! hddsaver - HDD Saver switch control for NCT6791D Super-I/O boards
//!
//! The switch is GPIO10 of the Nuvoton chip, reached through the Super-I/O
//! index/data ports. This library provides the port protocol, chip
//! identification, the device lifecycle and, with the `sim` feature, a
//! simulated chip for tests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hddsaver::{BoardIdentity, Bus, Driver, LockFileRegions, DevPort};
//! use hddsaver::lifecycle::ActivationOptions;
//!
//! let port = DevPort::open("/dev/port".as_ref()).unwrap();
//! let regions = LockFileRegions::new("/run/lock").unwrap();
//! let bus = Bus::new(Arc::new(port), Arc::new(regions));
//! let board = BoardIdentity::from_dmi_dir("/sys/devices/virtual/dmi/id".as_ref());
//! let driver = Driver::init(bus, board, ActivationOptions::default()).unwrap();
//! print!("{}", driver.show());
//! ```

pub mod attr;
pub mod board;
pub mod chip;
pub mod config;
pub mod constants;
pub mod device;
pub mod driver;
pub mod host;
pub mod lifecycle;
pub mod logger;
pub mod port;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod superio;

pub use board::BoardIdentity;
pub use chip::{identify, ChipKind, DeviceDescriptor};
pub use device::{Device, DeviceSnapshot};
pub use driver::Driver;
pub use host::{DevPort, LockFileRegions};
pub use hs_error::{HddSaverError, Result};
pub use lifecycle::{Lifecycle, Phase};
pub use port::{Bus, IoRegions, PortIo, RegionTable};
