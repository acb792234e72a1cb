use anyhow::{Result, anyhow};
use log::{Level, LevelFilter, Metadata, Record};

static LOGGER: ConsoleLogger = ConsoleLogger;

pub fn init(level: LevelFilter) -> Result<()> {
    log::set_logger(&LOGGER).map_err(|err| anyhow!("{err}"))?;
    log::set_max_level(level);
    Ok(())
}

pub struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => "\x1b[1;31m",
            Level::Warn => "\x1b[1;33m",
            Level::Info => "\x1b[1;94m",
            Level::Debug => "\x1b[1;30m",
            Level::Trace => "\x1b[1;90m",
        };
        eprintln!(
            "{}{:5}\x1b[0m [{}] {}",
            color,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // stderr is unbuffered
    }
}
