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

//! Super-I/O index/data protocol.
//!
//! A [`Sio`] value is proof that the chip's configuration space is unlocked
//! and that this process owns the index/data port pair. Dropping it (or
//! calling [`Sio::exit`]) writes the lock sequence and releases the ports, so
//! an early return with `?` between enter and exit cannot leave the chip
//! unlocked.

use std::fmt;
use std::io;

use tracing::{trace, warn};

use hs_error::Result;

use crate::constants::{ld, sio, DRVNAME};
use crate::port::{Bus, PortIo, Region};

/// Functional blocks multiplexed behind the index/data ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalDevice {
    /// GPIO data bank (logical device 8)
    GpioData,
    /// Hardware monitor (logical device B)
    Hwm,
}

impl LogicalDevice {
    pub fn number(self) -> u8 {
        match self {
            LogicalDevice::GpioData => ld::GPIO_DATA,
            LogicalDevice::Hwm => ld::HWM,
        }
    }
}

/// Unlocked configuration space of one Super-I/O chip
pub struct Sio<'a> {
    port: &'a dyn PortIo,
    addr: u16,
    region: Option<Region>,
}

impl<'a> Sio<'a> {
    /// Reserves `addr` and `addr + 1`, then writes the unlock key.
    ///
    /// Fails with `Busy` before touching any register when another owner
    /// holds the ports.
    pub(crate) fn enter(bus: &'a Bus, addr: u16) -> Result<Self> {
        let region = bus.request_region(addr, sio::PORT_COUNT, DRVNAME)?;
        let sio = Sio {
            port: bus.port(),
            addr,
            region: Some(region),
        };
        sio.port.outb(addr, sio::ENTER_KEY)?;
        sio.port.outb(addr, sio::ENTER_KEY)?;
        trace!("Entered Super-I/O config mode at {:#x}", addr);
        Ok(sio)
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn outb(&self, reg: u8, value: u8) -> Result<()> {
        self.port.outb(self.addr, reg)?;
        self.port.outb(self.addr + 1, value)?;
        Ok(())
    }

    pub fn inb(&self, reg: u8) -> Result<u8> {
        self.port.outb(self.addr, reg)?;
        Ok(self.port.inb(self.addr + 1)?)
    }

    /// 16-bit register, high byte at `reg`, low byte at `reg + 1`
    pub fn inw(&self, reg: u8) -> Result<u16> {
        let hi = self.inb(reg)?;
        let lo = self.inb(reg + 1)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Routes subsequent accesses above 0x30 to `dev`
    pub fn select(&self, dev: LogicalDevice) -> Result<()> {
        self.outb(sio::REG_LDSEL, dev.number())
    }

    /// Locks the configuration space and releases the ports
    pub fn exit(mut self) -> Result<()> {
        self.lock()?;
        Ok(())
    }

    fn lock(&mut self) -> io::Result<()> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        let res = self.write_exit_sequence();
        drop(region);
        trace!("Left Super-I/O config mode at {:#x}", self.addr);
        res
    }

    fn write_exit_sequence(&self) -> io::Result<()> {
        self.port.outb(self.addr, sio::EXIT_KEY)?;
        self.port.outb(self.addr, sio::REG_CONFIG_CONTROL)?;
        self.port.outb(self.addr + 1, sio::EXIT_WAIT_FOR_KEY)
    }
}

impl Drop for Sio<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock() {
            warn!("Failed to lock Super-I/O at {:#x}: {}", self.addr, e);
        }
    }
}

impl fmt::Debug for Sio<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sio")
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("locked", &self.region.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusOp, SimulatedChip};
    use hs_error::HddSaverError;

    #[test]
    fn test_enter_exit_sequence() {
        let chip = SimulatedChip::nct6791();
        let bus = chip.bus();
        let sio = bus.enter(0x2e).unwrap();
        sio.exit().unwrap();

        assert_eq!(
            chip.ops(),
            vec![
                BusOp::Out(0x2e, 0x87),
                BusOp::Out(0x2e, 0x87),
                BusOp::Out(0x2e, 0xaa),
                BusOp::Out(0x2e, 0x02),
                BusOp::Out(0x2f, 0x02),
            ]
        );
        assert!(chip.is_locked());
        assert_eq!(chip.regions().claimed(), 0);
    }

    #[test]
    fn test_read_write_use_index_then_data() {
        let chip = SimulatedChip::nct6791();
        let bus = chip.bus();
        let sio = bus.enter(0x2e).unwrap();
        chip.clear_ops();
        sio.select(LogicalDevice::GpioData).unwrap();
        let v = sio.inb(0xf1).unwrap();
        sio.outb(0xf1, v).unwrap();
        assert_eq!(
            chip.ops(),
            vec![
                BusOp::Out(0x2e, 0x07),
                BusOp::Out(0x2f, 0x08),
                BusOp::Out(0x2e, 0xf1),
                BusOp::In(0x2f),
                BusOp::Out(0x2e, 0xf1),
                BusOp::Out(0x2f, v),
            ]
        );
    }

    #[test]
    fn test_device_id_read_big_endian() {
        let chip = SimulatedChip::nct6791();
        let bus = chip.bus();
        let sio = bus.enter(0x2e).unwrap();
        assert_eq!(sio.inw(sio::REG_DEVID).unwrap(), 0xc803);
    }

    #[test]
    fn test_drop_locks_chip_on_early_return() {
        let chip = SimulatedChip::nct6791();
        let bus = chip.bus();

        fn failing(bus: &Bus) -> Result<u8> {
            let sio = bus.enter(0x2e)?;
            sio.inb(0x20)?;
            Err(HddSaverError::not_found("early return"))
        }

        assert!(failing(&bus).is_err());
        assert!(chip.is_locked());
        assert_eq!(chip.enter_count(), 1);
        assert_eq!(chip.exit_count(), 1);
        assert_eq!(chip.regions().claimed(), 0);
    }

    #[test]
    fn test_enter_busy_touches_nothing() {
        let chip = SimulatedChip::nct6791();
        let bus = chip.bus();
        let _held = bus.request_region(0x2e, 2, "nct6775").unwrap();

        let err = bus.enter(0x2e).unwrap_err();
        assert!(matches!(err, HddSaverError::Busy { start: 0x2e, end: 0x2f }));
        assert!(chip.ops().is_empty());
    }

    #[test]
    fn test_port_failure_still_locks() {
        let chip = SimulatedChip::nct6791();
        chip.fail_reads_at(0x20);
        let bus = chip.bus();
        let sio = bus.enter(0x2e).unwrap();
        assert!(matches!(sio.inw(0x20), Err(HddSaverError::Io(_))));
        drop(sio);
        assert_eq!(chip.exit_count(), 1);
        assert!(chip.is_locked());
    }
}
