//! BAR0 register file of the PCIe endpoint
//!
//! Registers are consecutive 32-bit words. Only a handful are driven by the
//! transport; the rest are bus-monitor counters that only show up in dumps.

use alloc::vec::Vec;

use log::info;
use scsc_regmap::Regmap;

use crate::RegisterValue;

macro_rules! bar0 {
    ($($name:ident),+ $(,)?) => {
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Copy, Clone)]
        #[repr(u32)]
        enum Index {
            $($name,)+
        }

        pub mod reg {
            $(pub const $name: u32 = super::Index::$name as u32 * 4;)+
        }

        const REGISTERS: &[(&str, u32)] = &[$((stringify!($name), reg::$name),)+];
    };
}

bar0! {
    NEWMSG,
    SIGNATURE,
    OFFSET,
    RUNEN,
    DEBUG,
    AXIWCNT,
    AXIRCNT,
    AXIWADDR,
    AXIRADDR,
    TBD,
    AXICTRL,
    AXIDATA,
    AXIRDBP,
    IFAXIWCNT,
    IFAXIRCNT,
    IFAXIWADDR,
    IFAXIRADDR,
    IFAXICTRL,
    GRST,
    AMBA2TRANSAXIWCNT,
    AMBA2TRANSAXIRCNT,
    AMBA2TRANSAXIWADDR,
    AMBA2TRANSAXIRADDR,
    AMBA2TRANSAXICTR,
    TRANS2PCIEREADALIGNAXIWCNT,
    TRANS2PCIEREADALIGNAXIRCNT,
    TRANS2PCIEREADALIGNAXIWADDR,
    TRANS2PCIEREADALIGNAXIRADDR,
    TRANS2PCIEREADALIGNAXICTRL,
    READROUNDTRIPMIN,
    READROUNDTRIPMAX,
    READROUNDTRIPLAST,
    CPTAW0,
    CPTAW1,
    CPTAR0,
    CPTAR1,
    CPTB0,
    CPTW0,
    CPTW1,
    CPTW2,
    CPTR0,
    CPTR1,
    CPTR2,
    CPTRES,
    CPTAWDELAY,
    CPTARDELAY,
    CPTSRTADDR,
    CPTENDADDR,
    CPTSZLTHID,
    CPTPHSEL,
    CPTRUN,
    FPGAVER,
    NEWMSG2,
    NEWMSG3,
}

/// Written to SIGNATURE and read back to prove BAR0 is reachable.
pub const SIGNATURE_MAGIC: u32 = 0xdead_beef;

/// Value written to a NEWMSG doorbell.
pub const DOORBELL: u32 = 1;

/// Read the whole register file. Unreadable registers are reported, never
/// propagated.
pub fn dump(map: &dyn Regmap) -> Vec<(&'static str, RegisterValue)> {
    REGISTERS
        .iter()
        .map(|&(name, offset)| {
            let value = map
                .read(offset)
                .map_or(RegisterValue::Unreadable, RegisterValue::Read);
            info!("BAR0 {name} {value}");
            (name, value)
        })
        .collect()
}
