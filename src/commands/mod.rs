//! Simulator command implementations.

pub mod boot;
pub mod pcie;

use colored::Colorize;
use scsc_regmap::Regmap;
use scsc_regmap::mock::MockRegmap;

/// Print every write `map` recorded, in order.
fn print_writes(map: &MockRegmap) {
    let writes = map.writes();
    println!("{} ({} writes)", map.name().cyan().bold(), writes.len());
    for (offset, value) in writes {
        println!("  +0x{offset:04x} <- 0x{value:08x}");
    }
}
