//! Log setup: plain lines off a terminal, progress-safe lines on one

use indicatif::MultiProgress;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(quiet: bool, debug: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Padded label for a level, wrapped in its ANSI colour when `color` is set.
fn level_label(level: log::Level, color: bool) -> String {
    let (label, ansi) = match level {
        log::Level::Error => ("ERROR", "31"),
        log::Level::Warn => ("WARN ", "33"),
        log::Level::Info => ("INFO ", "32"),
        log::Level::Debug => ("DEBUG", "36"),
        log::Level::Trace => ("TRACE", "35"),
    };
    if color {
        format!("\x1b[{ansi}m{label}\x1b[0m")
    } else {
        label.to_string()
    }
}

/// Logger that prints above the stage spinners instead of through them.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", level_label(record.level(), true), record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the global logger. Pass `multi` on a TTY.
///
/// Fails only when a logger is already installed.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
) -> Result<(), log::SetLoggerError> {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(default_filter(quiet, debug));
    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env).build();
            let max_level = logger.filter();
            log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))?;
            log::set_max_level(max_level);
        }
        None => {
            env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    writeln!(buf, "[{}] {}", level_label(record.level(), false), record.args())
                })
                .try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_wins_over_quiet() {
        assert_eq!(default_filter(true, true), "debug");
        assert_eq!(default_filter(true, false), "warn");
        assert_eq!(default_filter(false, false), "info");
    }

    #[test]
    fn labels_are_padded() {
        assert_eq!(level_label(log::Level::Warn, false), "WARN ");
        assert!(level_label(log::Level::Error, true).contains("ERROR"));
    }
}
