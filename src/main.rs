//! WLBT transport simulator
//!
//! Drives the MIF transports against mock hardware on the host: the PMU, BAAW
//! and boot configuration blocks are recording register maps and the
//! subsystem's side of the handshake is played by interrupt hooks.

mod commands;
mod host;
mod logger;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "wlbt-sim")]
#[command(version = "0.1.0")]
#[command(about = "Run the WLBT memory interface against simulated hardware", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Power the subsystem on through the platform transport
    Boot {
        /// SoC whose PMU sequence and address windows are used
        #[arg(long, value_enum, default_value = "9630")]
        variant: Soc,

        /// Physical start of the shared DRAM carve-out
        #[arg(long, default_value = "0x90000000", value_parser = parse_addr)]
        mem_start: u64,

        /// The simulated subsystem never raises CFG_REQ
        #[arg(long)]
        no_cfg_req: bool,

        /// Program the address windows from a worker thread
        #[arg(long)]
        deferred: bool,
    },

    /// Map the pcie transport and exercise its emulated mailbox
    Pcie,
}

#[derive(Copy, Clone, ValueEnum)]
enum Soc {
    #[value(name = "9630")]
    Exynos9630,
    #[value(name = "9610")]
    Exynos9610,
}

fn parse_addr(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid address {s}: {err}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    logger::init(level)?;

    match cli.command {
        Commands::Boot {
            variant,
            mem_start,
            no_cfg_req,
            deferred,
        } => commands::boot::run(&commands::boot::BootOptions {
            variant,
            mem_start,
            cfg_req: !no_cfg_req,
            deferred,
        }),
        Commands::Pcie => commands::pcie::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr("0x9000_0000"), Ok(0x9000_0000));
        assert_eq!(parse_addr("4096"), Ok(4096));
        assert!(parse_addr("0xzz").is_err());
    }

    #[test]
    fn test_cli_parses_boot_flags() {
        let cli = Cli::try_parse_from(["wlbt-sim", "-v", "boot", "--variant", "9610", "--deferred"])
            .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Boot {
            variant,
            mem_start,
            no_cfg_req,
            deferred,
        } = cli.command
        else {
            panic!("expected boot");
        };
        assert!(matches!(variant, Soc::Exynos9610));
        assert_eq!(mem_start, 0x9000_0000);
        assert!(!no_cfg_req);
        assert!(deferred);
    }
}
