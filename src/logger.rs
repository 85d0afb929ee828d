use std::io::Write;
use std::sync::atomic::{self, AtomicBool};

use colored::Colorize;
use log::{Metadata, Record};
use parking_lot::Mutex;

use crate::config::Config;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

struct Logger {
    stderr: Mutex<std::io::Stderr>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            stderr: Mutex::new(std::io::stderr()),
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let msg_str = format!("{}", record.args());
            let msg_str_colored = match record.level() {
                log::Level::Error => msg_str.red().bold(),
                log::Level::Warn => msg_str.yellow(),
                log::Level::Info => msg_str.white(),
                log::Level::Debug => msg_str.dimmed(),
                log::Level::Trace => msg_str.dimmed(),
            };

            let now = chrono::Local::now();
            let time_str = format!("[ {} ]", now.format("%Y-%m-%d %H:%M:%S"));

            let mut stderr = self.stderr.lock();
            let _ = writeln!(stderr, "{} {}", time_str.green(), msg_str_colored);
        }
    }

    fn flush(&self) {
        let _ = self.stderr.lock().flush();
    }
}

/// Install the stderr logger. Calling it again only refreshes the level.
pub fn init_logger() {
    let level: log::LevelFilter = Config::global().log.level.into();

    if LOGGER_INITIALIZED.swap(true, atomic::Ordering::SeqCst) {
        log::set_max_level(level);
        return;
    }

    // another logger may already be installed by the host
    if log::set_boxed_logger(Box::new(Logger::new())).is_err() {
        return;
    }
    log::set_max_level(level);
}
