/*
 * Integration tests for hddsaver
 *
 * These drive the whole lifecycle against the simulated NCT6791 and check
 * the register file and port traffic the chip would have seen.
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hddsaver::constants::{gpio, ld, nct6791, sio};
use hddsaver::lifecycle::{ActivationOptions, Lifecycle, Phase};
use hddsaver::sim::SimulatedChip;
use hddsaver::{BoardIdentity, Bus, Driver, HddSaverError, IoRegions, RegionTable};

fn opts() -> ActivationOptions {
    ActivationOptions {
        retry_delay: Duration::ZERO,
        ..ActivationOptions::default()
    }
}

fn extreme4() -> BoardIdentity {
    BoardIdentity::new("ASRock", "Z97 Extreme4")
}

/// Region table where another driver holds the Super-I/O ports for the first
/// `refusals` claims
struct ContendedPorts {
    table: RegionTable,
    refusals: u32,
    sio_attempts: AtomicU32,
}

impl ContendedPorts {
    fn new(refusals: u32) -> Arc<Self> {
        Arc::new(Self {
            table: RegionTable::new(),
            refusals,
            sio_attempts: AtomicU32::new(0),
        })
    }

    fn attempts(&self) -> u32 {
        self.sio_attempts.load(Ordering::SeqCst)
    }
}

impl IoRegions for ContendedPorts {
    fn try_claim(&self, start: u16, len: u16, owner: &'static str) -> hddsaver::Result<bool> {
        if start == sio::ADDR_PRIMARY {
            let n = self.sio_attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.refusals {
                return Ok(false);
            }
        }
        self.table.try_claim(start, len, owner)
    }

    fn release(&self, start: u16, len: u16) {
        self.table.release(start, len)
    }
}

fn contended_bus(chip: &SimulatedChip, ports: &Arc<ContendedPorts>) -> Bus {
    Bus::new(Arc::new(chip.clone()), ports.clone())
}

fn assert_brackets_closed(chip: &SimulatedChip) {
    assert_eq!(chip.enter_count(), chip.exit_count());
    assert!(chip.is_locked());
    assert_eq!(chip.regions().owner_of(0x2e), None);
    assert_eq!(chip.regions().owner_of(0x2f), None);
}

#[test]
fn test_full_lifecycle() {
    let chip = SimulatedChip::nct6791();
    let bus = chip.bus();

    let (state, res) = Lifecycle::Unprobed.probe(&bus, &extreme4(), &opts());
    res.unwrap();
    assert_eq!(state.phase(), Phase::Ready);
    assert_brackets_closed(&chip);
    assert_eq!(chip.regions().owner_of(0x295), Some("hddsaver"));
    assert_eq!(chip.regions().owner_of(0x296), Some("hddsaver"));

    let dev = state.device().unwrap();
    assert!(dev.have_feature());
    assert!(!dev.read_toggle());
    dev.write_toggle(true).unwrap();
    assert!(dev.read_toggle());

    let (state, res) = state.suspend();
    res.unwrap();
    assert_eq!(state.phase(), Phase::Suspended);

    let (state, res) = state.resume();
    res.unwrap();
    assert_eq!(state.phase(), Phase::Ready);
    assert!(!state.device().unwrap().snapshot().valid);
    assert!(state.device().unwrap().read_toggle());
    assert_brackets_closed(&chip);

    let state = state.remove();
    assert_eq!(state.phase(), Phase::Removed);
    assert_eq!(chip.regions().claimed(), 0);
    // Removal leaves the switch where it was
    assert_eq!(chip.device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA), 0xad);
}

#[test]
fn test_probe_reads_initial_status() {
    let chip = SimulatedChip::nct6791();
    chip.set_device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA, 0x81);

    let driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();
    assert_eq!(driver.show(), "On\n");
    assert_eq!(driver.device().unwrap().snapshot().bank, 0xff);
}

#[test]
fn test_board_gating_overrides_strap() {
    for board in [
        BoardIdentity::new("ASRock", "Z97 Extreme3"),
        BoardIdentity::new("Gigabyte Technology Co., Ltd.", "Z97X-UD3H"),
        BoardIdentity::default(),
    ] {
        let chip = SimulatedChip::nct6791();
        chip.set_device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA, 0x01);
        assert_ne!(chip.global_reg(sio::REG_GLOBAL_OPTION) & sio::HDDSAVER_STRAP_BIT, 0);

        let driver = Driver::init(chip.bus(), board, opts()).unwrap();
        let dev = driver.device().unwrap();
        assert!(!dev.have_feature());
        assert_eq!(driver.show(), "Off\n");

        // Writes are accepted but never reach the GPIO bank
        chip.clear_ops();
        assert_eq!(driver.store("on"), 2);
        assert_eq!(driver.show(), "Off\n");
        assert!(chip.writes_to(gpio::REG_GPIO1_DATA).is_empty());
        assert!(chip.ops().is_empty());
    }
}

#[test]
fn test_strap_clear_means_no_feature() {
    let chip = SimulatedChip::nct6791();
    chip.set_global_reg(sio::REG_GLOBAL_OPTION, 0x00);
    let driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();
    assert!(!driver.device().unwrap().have_feature());
}

#[test]
fn test_zero_base_address_refused() {
    let chip = SimulatedChip::nct6791().with_hwm_base(0);
    let err = Driver::init(chip.bus(), extreme4(), opts()).err().unwrap();
    assert!(matches!(err, HddSaverError::NotFound(_)));
    assert_eq!(chip.regions().claimed(), 0);
    assert_brackets_closed(&chip);
}

#[test]
fn test_unknown_chip_not_touched() {
    let chip = SimulatedChip::nct6791().with_device_id(0xb472);
    chip.set_device_reg(ld::HWM, sio::REG_ENABLE, 0x00);

    let mut driver = Driver::new(chip.bus(), extreme4(), opts());
    assert!(matches!(driver.probe(), Err(HddSaverError::NotFound(_))));
    assert_eq!(driver.phase(), Phase::Unprobed);
    assert_eq!(chip.device_reg(ld::HWM, sio::REG_ENABLE), 0x00);
    assert_eq!(chip.device_reg(ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE), 0x10);
    assert_brackets_closed(&chip);
}

#[test]
fn test_hwm_window_held_elsewhere_is_busy() {
    let chip = SimulatedChip::nct6791();
    let bus = chip.bus();
    let _hwmon = bus.request_region(0x295, 2, "nct6775").unwrap();

    let mut driver = Driver::new(bus, extreme4(), opts());
    let err = driver.probe().unwrap_err();
    assert!(matches!(err, HddSaverError::Busy { start: 0x295, end: 0x296 }));
    assert_eq!(driver.phase(), Phase::Unprobed);
    assert!(driver.device().is_none());
    assert_eq!(chip.regions().claimed(), 1);
    assert_eq!(chip.regions().owner_of(0x295), Some("nct6775"));
    assert_brackets_closed(&chip);
}

#[test]
fn test_probe_retry_after_contention_clears() {
    let chip = SimulatedChip::nct6791();
    let bus = chip.bus();
    let hwmon = bus.request_region(0x295, 2, "nct6775").unwrap();

    let mut driver = Driver::new(bus, extreme4(), opts());
    assert!(driver.probe().is_err());
    drop(hwmon);
    driver.probe().unwrap();
    assert_eq!(driver.phase(), Phase::Ready);
}

#[test]
fn test_second_legacy_address_scanned() {
    let chip = SimulatedChip::nct6791().at(0x4e);
    let options = ActivationOptions {
        addresses: vec![0x2e, 0x4e],
        ..opts()
    };

    let driver = Driver::init(chip.bus(), extreme4(), options).unwrap();
    assert_eq!(driver.device().unwrap().sio_addr(), 0x4e);
}

#[test]
fn test_resume_twice_is_idempotent() {
    let chip = SimulatedChip::nct6791();
    let mut driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();

    // Firmware re-locks the I/O space and disables the HWM over sleep
    assert_eq!(driver.suspend(), 0);
    chip.set_device_reg(ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE, 0x14);
    chip.set_device_reg(ld::HWM, sio::REG_ENABLE, 0x00);
    chip.clear_ops();

    assert_eq!(driver.resume(), 0);
    let after_first = (
        chip.device_reg(ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE),
        chip.device_reg(ld::HWM, sio::REG_ENABLE),
    );
    assert_eq!(driver.resume(), 0);
    let after_second = (
        chip.device_reg(ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE),
        chip.device_reg(ld::HWM, sio::REG_ENABLE),
    );

    assert_eq!(after_first, (0x04, 0x01));
    assert_eq!(after_second, after_first);
    assert_eq!(chip.writes_to(nct6791::REG_HM_IO_SPACE_LOCK_ENABLE), vec![0x04]);
    assert_eq!(chip.writes_to(sio::REG_ENABLE), vec![0x01]);
    assert_eq!(driver.phase(), Phase::Ready);
    assert!(!driver.device().unwrap().snapshot().valid);
    assert_brackets_closed(&chip);
}

#[test]
fn test_resume_busy_reports_and_continues() {
    let chip = SimulatedChip::nct6791();
    let bus = chip.bus();
    let mut driver = Driver::init(bus.clone(), extreme4(), opts()).unwrap();
    assert_eq!(driver.suspend(), 0);

    let held = bus.request_region(0x2e, 2, "it87").unwrap();
    assert_eq!(driver.resume(), -libc::EBUSY);
    assert_eq!(driver.phase(), Phase::Ready);
    assert!(!driver.device().unwrap().snapshot().valid);
    drop(held);

    chip.set_device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA, 0xad);
    assert_eq!(driver.show(), "On\n");
}

#[test]
fn test_store_round_trip_preserves_gpio_byte() {
    let chip = SimulatedChip::nct6791();
    chip.set_device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA, 0x5a);
    let driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();

    assert_eq!(driver.store("1"), 1);
    assert_eq!(chip.device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA), 0x5b);
    assert_eq!(driver.store("off\n"), 4);
    assert_eq!(chip.device_reg(ld::GPIO_DATA, gpio::REG_GPIO1_DATA), 0x5a);

    // Repeating the current state is free
    chip.clear_ops();
    assert_eq!(driver.store("n"), 1);
    assert!(chip.ops().is_empty());
    assert_brackets_closed(&chip);
}

#[test]
fn test_store_invalid_input_leaves_hardware() {
    let chip = SimulatedChip::nct6791();
    let driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();
    chip.clear_ops();

    assert_eq!(driver.store("please"), -(libc::EINVAL as isize));
    assert!(chip.ops().is_empty());
    assert_eq!(driver.show(), "Off\n");
}

#[test]
fn test_discovery_waits_out_brief_port_contention() {
    let chip = SimulatedChip::nct6791();
    let ports = ContendedPorts::new(2);

    let driver = Driver::init(contended_bus(&chip, &ports), extreme4(), opts()).unwrap();
    assert_eq!(driver.phase(), Phase::Ready);
    // Two refused, one for identify, one for activation
    assert_eq!(ports.attempts(), 4);
    assert_eq!(chip.enter_count(), chip.exit_count());
    assert!(chip.is_locked());
}

#[test]
fn test_discovery_gives_up_on_held_ports() {
    let chip = SimulatedChip::nct6791();
    let ports = ContendedPorts::new(u32::MAX);

    let mut driver = Driver::new(contended_bus(&chip, &ports), extreme4(), opts());
    let err = driver.probe().unwrap_err();
    assert!(matches!(err, HddSaverError::Busy { start: 0x2e, end: 0x2f }));
    assert_eq!(ports.attempts(), 5);
    assert_eq!(driver.phase(), Phase::Unprobed);
    assert_eq!(ports.table.claimed(), 0);
    assert_eq!(chip.enter_count(), 0);
}

#[test]
fn test_resume_after_fresh_activation_rewrites_nothing() {
    let chip = SimulatedChip::nct6791();
    chip.set_device_reg(ld::HWM, sio::REG_ENABLE, 0x00);
    let mut driver = Driver::init(chip.bus(), extreme4(), opts()).unwrap();

    // Activation already enabled the monitor and cleared the I/O space lock
    assert_eq!(chip.device_reg(ld::HWM, sio::REG_ENABLE), 0x01);
    assert_eq!(chip.device_reg(ld::HWM, nct6791::REG_HM_IO_SPACE_LOCK_ENABLE), 0x00);
    chip.clear_ops();

    assert_eq!(driver.resume(), 0);
    assert!(chip.writes_to(sio::REG_ENABLE).is_empty());
    assert!(chip.writes_to(nct6791::REG_HM_IO_SPACE_LOCK_ENABLE).is_empty());
    assert_eq!(driver.phase(), Phase::Ready);
}
