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

//! Simulated NCT6791 register file.
//!
//! Models just enough of the chip for the protocol code: the enter/exit key
//! state machine, the global registers below 0x30, per-logical-device
//! registers above it, and a log of every port access. Used by the unit and
//! integration tests; nothing here touches real hardware.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::{gpio, ld, nct6791, sio};
use crate::port::{Bus, PortIo, RegionTable};

/// One port access as seen on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Out(u16, u8),
    In(u16),
}

#[derive(Debug)]
struct ChipState {
    addr: u16,
    present: bool,
    unlocked: bool,
    keys_seen: u8,
    index: u8,
    global: [u8; 0x30],
    devices: HashMap<(u8, u8), u8>,
    ops: Vec<BusOp>,
    enters: usize,
    exits: usize,
    fail_reads_at: Option<u8>,
}

impl ChipState {
    fn ldn(&self) -> u8 {
        self.global[usize::from(sio::REG_LDSEL)]
    }

    fn read_reg(&self, reg: u8) -> u8 {
        if reg < 0x30 {
            self.global[usize::from(reg)]
        } else {
            self.devices.get(&(self.ldn(), reg)).copied().unwrap_or(0)
        }
    }

    fn write_reg(&mut self, reg: u8, value: u8) {
        match reg {
            // device ID is read-only
            0x20 | 0x21 => {}
            r if r < 0x30 => self.global[usize::from(r)] = value,
            r => {
                let ldn = self.ldn();
                self.devices.insert((ldn, r), value);
            }
        }
    }
}

/// Simulated Super-I/O chip plus the region table its bus uses
#[derive(Clone)]
pub struct SimulatedChip {
    state: Arc<Mutex<ChipState>>,
    regions: Arc<RegionTable>,
}

impl SimulatedChip {
    /// NCT6791D at 0x2e on a board with the HDD Saver strap set.
    ///
    /// The hardware monitor sits at 0x290 and is enabled, its I/O space
    /// lock bit is set, and GPIO1 data reads 0xac (HDD Saver off).
    pub fn nct6791() -> Self {
        let mut global = [0u8; 0x30];
        global[0x20] = 0xc8;
        global[0x21] = 0x03;
        global[usize::from(sio::REG_GLOBAL_OPTION)] = sio::HDDSAVER_STRAP_BIT;

        let mut devices = HashMap::new();
        devices.insert((ld::HWM, sio::REG_ADDR), 0x02);
        devices.insert((ld::HWM, sio::REG_ADDR + 1), 0x90);
        devices.insert((ld::HWM, sio::REG_ENABLE), 0x01);
        devices.insert((ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE), 0x10);
        devices.insert((ld::GPIO_DATA, gpio::REG_GPIO1_DATA), 0xac);

        Self::from_state(ChipState {
            addr: sio::ADDR_PRIMARY,
            present: true,
            unlocked: false,
            keys_seen: 0,
            index: 0,
            global,
            devices,
            ops: Vec::new(),
            enters: 0,
            exits: 0,
            fail_reads_at: None,
        })
    }

    /// Nothing decodes the ports: every read floats high
    pub fn absent() -> Self {
        let chip = Self::nct6791();
        chip.state.lock().present = false;
        chip
    }

    fn from_state(state: ChipState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            regions: Arc::new(RegionTable::new()),
        }
    }

    /// Moves the chip to another index port
    pub fn at(self, addr: u16) -> Self {
        self.state.lock().addr = addr;
        self
    }

    pub fn with_device_id(self, id: u16) -> Self {
        {
            let mut st = self.state.lock();
            let [hi, lo] = id.to_be_bytes();
            st.global[0x20] = hi;
            st.global[0x21] = lo;
        }
        self
    }

    pub fn with_hwm_base(self, base: u16) -> Self {
        let [hi, lo] = base.to_be_bytes();
        self.set_device_reg(ld::HWM, sio::REG_ADDR, hi);
        self.set_device_reg(ld::HWM, sio::REG_ADDR + 1, lo);
        self
    }

    pub fn bus(&self) -> Bus {
        Bus::new(Arc::new(self.clone()), self.regions.clone())
    }

    pub fn regions(&self) -> &Arc<RegionTable> {
        &self.regions
    }

    pub fn global_reg(&self, reg: u8) -> u8 {
        self.state.lock().global[usize::from(reg)]
    }

    pub fn set_global_reg(&self, reg: u8, value: u8) {
        self.state.lock().global[usize::from(reg)] = value;
    }

    pub fn device_reg(&self, ldn: u8, reg: u8) -> u8 {
        self.state.lock().devices.get(&(ldn, reg)).copied().unwrap_or(0)
    }

    pub fn set_device_reg(&self, ldn: u8, reg: u8, value: u8) {
        self.state.lock().devices.insert((ldn, reg), value);
    }

    /// Data port reads of register `reg` fail with an I/O error
    pub fn fail_reads_at(&self, reg: u8) {
        self.state.lock().fail_reads_at = Some(reg);
    }

    pub fn clear_failures(&self) {
        self.state.lock().fail_reads_at = None;
    }

    pub fn ops(&self) -> Vec<BusOp> {
        self.state.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// Data port writes of `value` to register `reg`, in order
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        let st = self.state.lock();
        let mut out = Vec::new();
        let mut index = None;
        for op in &st.ops {
            match *op {
                BusOp::Out(p, v) if p == st.addr => index = Some(v),
                BusOp::Out(p, v) if p == st.addr + 1 && index == Some(reg) => out.push(v),
                _ => {}
            }
        }
        out
    }

    pub fn is_locked(&self) -> bool {
        !self.state.lock().unlocked
    }

    pub fn enter_count(&self) -> usize {
        self.state.lock().enters
    }

    pub fn exit_count(&self) -> usize {
        self.state.lock().exits
    }
}

impl PortIo for SimulatedChip {
    fn inb(&self, port: u16) -> io::Result<u8> {
        let mut st = self.state.lock();
        st.ops.push(BusOp::In(port));
        if !st.present || !st.unlocked {
            return Ok(0xff);
        }
        if port == st.addr {
            return Ok(st.index);
        }
        if port != st.addr + 1 {
            return Ok(0xff);
        }
        if st.fail_reads_at == Some(st.index) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("simulated read failure at {:#04x}", st.index),
            ));
        }
        Ok(st.read_reg(st.index))
    }

    fn outb(&self, port: u16, value: u8) -> io::Result<()> {
        let mut st = self.state.lock();
        st.ops.push(BusOp::Out(port, value));
        if !st.present {
            return Ok(());
        }
        if port == st.addr {
            if st.unlocked {
                if value == sio::EXIT_KEY {
                    st.unlocked = false;
                    st.exits += 1;
                } else {
                    st.index = value;
                }
            } else if value == sio::ENTER_KEY {
                st.keys_seen += 1;
                if st.keys_seen == 2 {
                    st.keys_seen = 0;
                    st.unlocked = true;
                    st.enters += 1;
                }
            } else {
                st.keys_seen = 0;
            }
        } else if port == st.addr + 1 && st.unlocked {
            let index = st.index;
            st.write_reg(index, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_chip_reads_float() {
        let chip = SimulatedChip::nct6791();
        chip.outb(0x2e, 0x20).unwrap();
        assert_eq!(chip.inb(0x2f).unwrap(), 0xff);
    }

    #[test]
    fn test_single_key_does_not_unlock() {
        let chip = SimulatedChip::nct6791();
        chip.outb(0x2e, 0x87).unwrap();
        chip.outb(0x2e, 0x20).unwrap();
        chip.outb(0x2e, 0x87).unwrap();
        assert!(chip.is_locked());
    }

    #[test]
    fn test_device_registers_follow_ldn() {
        let chip = SimulatedChip::nct6791();
        chip.outb(0x2e, 0x87).unwrap();
        chip.outb(0x2e, 0x87).unwrap();
        chip.outb(0x2e, 0x07).unwrap();
        chip.outb(0x2f, 0x0b).unwrap();
        chip.outb(0x2e, 0x60).unwrap();
        assert_eq!(chip.inb(0x2f).unwrap(), 0x02);
        chip.outb(0x2e, 0x07).unwrap();
        chip.outb(0x2f, 0x08).unwrap();
        chip.outb(0x2e, 0xf1).unwrap();
        assert_eq!(chip.inb(0x2f).unwrap(), 0xac);
    }

    #[test]
    fn test_writes_to_tracks_index() {
        let chip = SimulatedChip::nct6791();
        chip.outb(0x2e, 0x87).unwrap();
        chip.outb(0x2e, 0x87).unwrap();
        chip.outb(0x2e, 0x30).unwrap();
        chip.outb(0x2f, 0x01).unwrap();
        chip.outb(0x2e, 0x31).unwrap();
        chip.outb(0x2f, 0x05).unwrap();
        assert_eq!(chip.writes_to(0x30), vec![0x01]);
    }
}
