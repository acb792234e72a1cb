//! Mock Regmap Tests
//!
//! The mock is the hardware stand-in for every transport test, so its
//! recording and failure injection have to be exact.

use scsc_regmap::mock::{Access, MockRegmap};
use scsc_regmap::{Regmap, RegmapError};

#[test]
fn records_accesses_in_order() {
    let map = MockRegmap::new("boot_cfg");

    map.write(0x0, 1).expect("write");
    map.write(0x1000, 0xe875_0002).expect("write");
    let value = map.read(0x1000).expect("read");
    map.write(0x0, 0).expect("write");

    assert_eq!(value, 0xe875_0002);
    assert_eq!(
        map.accesses(),
        vec![
            Access::Write {
                offset: 0x0,
                value: 1
            },
            Access::Write {
                offset: 0x1000,
                value: 0xe875_0002
            },
            Access::Read {
                offset: 0x1000,
                value: 0xe875_0002
            },
            Access::Write {
                offset: 0x0,
                value: 0
            },
        ]
    );
    assert_eq!(map.writes_to(0x0), vec![1, 0]);
}

#[test]
fn failed_write_is_not_recorded() {
    let map = MockRegmap::new("dbus_baaw");
    map.fail_writes_at(0x4);

    assert_eq!(map.write(0x4, 7), Err(RegmapError::Write { offset: 0x4 }));
    assert!(map.writes().is_empty());
    assert_eq!(map.get(0x4), 0);

    map.heal(0x4);
    map.write(0x4, 7).expect("write after heal");
    assert_eq!(map.writes(), vec![(0x4, 7)]);
}

#[test]
fn write_hook_models_hardware_status() {
    const CONFIGURATION: u32 = 0x3300;
    const STATUS: u32 = 0x3304;

    let map = MockRegmap::new("pmu");
    map.on_write(CONFIGURATION, |value, regs| {
        regs.insert(STATUS, value & 1);
    });

    map.set_bits(CONFIGURATION, 1).expect("power on");
    assert_eq!(map.get(STATUS), 1);

    map.clear_bits(CONFIGURATION, 1).expect("power off");
    assert_eq!(map.get(STATUS), 0);
}

#[test]
fn clear_log_keeps_register_state() {
    let map = MockRegmap::new("pmu").with_value(0x58, 0x11);
    map.write(0x5c, 3).expect("write");
    map.clear_log();

    assert!(map.accesses().is_empty());
    assert_eq!(map.get(0x58), 0x11);
    assert_eq!(map.get(0x5c), 3);
}
