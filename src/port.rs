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

//! Raw port access and I/O region bookkeeping.
//!
//! `PortIo` is the only place bytes hit the bus; `IoRegions` decides who owns
//! which ports. Both are traits so the protocol code can run against the
//! simulated chip in [`crate::sim`] as well as `/dev/port`.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use hs_error::{HddSaverError, Result};

use crate::superio::Sio;

/// Byte-wide access to the legacy I/O port space
pub trait PortIo: Send + Sync {
    fn inb(&self, port: u16) -> io::Result<u8>;
    fn outb(&self, port: u16, value: u8) -> io::Result<()>;
}

/// Exclusive ownership of port ranges
#[cfg_attr(test, mockall::automock)]
pub trait IoRegions: Send + Sync {
    /// Claims `len` ports starting at `start`.
    ///
    /// Returns `Ok(false)` without blocking when any port in the range is
    /// already held.
    fn try_claim(&self, start: u16, len: u16, owner: &'static str) -> Result<bool>;
    fn release(&self, start: u16, len: u16);
}

/// A claimed port range, released on drop
pub struct Region {
    regions: Arc<dyn IoRegions>,
    start: u16,
    len: u16,
}

impl Region {
    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn len(&self) -> u16 {
        self.len
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("start", &format_args!("{:#x}", self.start))
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        debug!("Releasing I/O region {:#x}+{}", self.start, self.len);
        self.regions.release(self.start, self.len);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    start: u16,
    len: u16,
    owner: &'static str,
}

impl Claim {
    fn overlaps(&self, start: u16, len: u16) -> bool {
        let (a0, a1) = (u32::from(self.start), u32::from(self.start) + u32::from(self.len));
        let (b0, b1) = (u32::from(start), u32::from(start) + u32::from(len));
        a0 < b1 && b0 < a1
    }
}

/// In-process region table
#[derive(Debug, Default)]
pub struct RegionTable {
    claims: Mutex<Vec<Claim>>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner of the claim covering `port`, if any
    pub fn owner_of(&self, port: u16) -> Option<&'static str> {
        self.claims
            .lock()
            .iter()
            .find(|c| c.overlaps(port, 1))
            .map(|c| c.owner)
    }

    pub fn claimed(&self) -> usize {
        self.claims.lock().len()
    }
}

impl IoRegions for RegionTable {
    fn try_claim(&self, start: u16, len: u16, owner: &'static str) -> Result<bool> {
        let mut claims = self.claims.lock();
        if claims.iter().any(|c| c.overlaps(start, len)) {
            return Ok(false);
        }
        claims.push(Claim { start, len, owner });
        Ok(true)
    }

    fn release(&self, start: u16, len: u16) {
        self.claims.lock().retain(|c| !(c.start == start && c.len == len));
    }
}

/// Port access plus region ownership for one host bus
#[derive(Clone)]
pub struct Bus {
    port: Arc<dyn PortIo>,
    regions: Arc<dyn IoRegions>,
}

impl Bus {
    pub fn new(port: Arc<dyn PortIo>, regions: Arc<dyn IoRegions>) -> Self {
        Self { port, regions }
    }

    pub fn port(&self) -> &dyn PortIo {
        self.port.as_ref()
    }

    /// Single non-blocking attempt to claim a port range
    pub fn request_region(&self, start: u16, len: u16, owner: &'static str) -> Result<Region> {
        if self.regions.try_claim(start, len, owner)? {
            Ok(Region {
                regions: Arc::clone(&self.regions),
                start,
                len,
            })
        } else {
            Err(HddSaverError::busy(start, len))
        }
    }

    /// Opens the configuration bracket of the Super-I/O chip at `addr`
    pub fn enter(&self, addr: u16) -> Result<Sio<'_>> {
        Sio::enter(self, addr)
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").finish_non_exhaustive()
    }
}
