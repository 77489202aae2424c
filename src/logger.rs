use log::{LevelFilter, SetLoggerError};
use std::io::Write;

// Diagnostics go to stderr so that stdout carries nothing but the addresses.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr().lock(), "{}", format_record(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_record(record: &log::Record) -> String {
    format!(
        "<{:>5}>: {:>12}:{:03}: {}",
        record.metadata().level(),
        record.file().unwrap_or("?"),
        record.line().unwrap_or(0),
        record.args()
    )
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn records_carry_level_and_location() {
        let s = format_record(
            &log::Record::builder()
                .args(format_args!("mapped 4096 bytes"))
                .level(Level::Debug)
                .file(Some("src/platformalloc.rs"))
                .line(Some(7))
                .build(),
        );
        assert_eq!(s, "<DEBUG>: src/platformalloc.rs:007: mapped 4096 bytes");
    }

    #[test]
    fn missing_location_is_marked() {
        let s = format_record(
            &log::Record::builder()
                .args(format_args!("x"))
                .level(Level::Warn)
                .build(),
        );
        assert_eq!(s, "< WARN>:            ?:000: x");
    }
}
