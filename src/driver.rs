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

//! Host-facing adapter around [`Lifecycle`].
//!
//! Translates lifecycle results into the status codes a host expects:
//! attribute writes return bytes consumed or a negative errno, power
//! management hooks return 0 or a negative errno. Every hook is safe to call
//! before the device has been activated.

use tracing::{error, info};

use hs_error::{HddSaverError, Result};

use crate::attr;
use crate::board::BoardIdentity;
use crate::device::Device;
use crate::lifecycle::{ActivationOptions, Lifecycle, Phase};
use crate::port::Bus;

pub struct Driver {
    bus: Bus,
    board: BoardIdentity,
    opts: ActivationOptions,
    lifecycle: Lifecycle,
}

impl Driver {
    /// Driver with nothing probed yet
    pub fn new(bus: Bus, board: BoardIdentity, opts: ActivationOptions) -> Self {
        Self {
            bus,
            board,
            opts,
            lifecycle: Lifecycle::Unprobed,
        }
    }

    /// Module entry: one-shot discovery and activation.
    ///
    /// Fails when no device could be activated; nothing stays reserved.
    pub fn init(bus: Bus, board: BoardIdentity, opts: ActivationOptions) -> Result<Self> {
        let mut driver = Self::new(bus, board, opts);
        driver.probe()?;
        Ok(driver)
    }

    pub fn probe(&mut self) -> Result<()> {
        let (next, res) = self.take().probe(&self.bus, &self.board, &self.opts);
        self.lifecycle = next;
        if let Err(e) = &res {
            match e {
                HddSaverError::NotFound(_) => info!("{}", e),
                _ => error!("Probe failed: {}", e),
            }
        }
        res
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn device(&self) -> Option<&Device> {
        self.lifecycle.device()
    }

    pub fn board(&self) -> &BoardIdentity {
        &self.board
    }

    /// Attribute read, never fails
    pub fn show(&self) -> String {
        attr::show(self.device())
    }

    /// Attribute write: bytes consumed, or a negative errno
    pub fn store(&self, buf: &str) -> isize {
        match attr::store(self.device(), buf) {
            Ok(n) => n as isize,
            Err(e) => {
                error!("Failed to change HDD Saver: {}", e);
                e.errno() as isize
            }
        }
    }

    pub fn suspend(&mut self) -> i32 {
        let (next, res) = self.take().suspend();
        self.lifecycle = next;
        status(res)
    }

    pub fn resume(&mut self) -> i32 {
        let (next, res) = self.take().resume();
        self.lifecycle = next;
        status(res)
    }

    /// Module exit: unbinds the device and releases its region
    pub fn exit(mut self) {
        self.lifecycle = self.take().remove();
    }

    fn take(&mut self) -> Lifecycle {
        std::mem::take(&mut self.lifecycle)
    }
}

fn status(res: Result<()>) -> i32 {
    match res {
        Ok(()) => 0,
        Err(e) => e.errno(),
    }
}
