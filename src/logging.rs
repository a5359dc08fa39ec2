use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        mpsc::{self, Sender},
        OnceLock,
    },
    thread,
    time::Duration,
};

use crate::utility::working_dir;

/* =========================
   GLOBAL STATE
   ========================= */

static ENABLED: AtomicBool = AtomicBool::new(false);
static CONSOLE: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_WARN);
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_TX: OnceLock<Sender<LogMessage>> = OnceLock::new();

const LEVEL_ERROR: u8 = 0;
const LEVEL_WARN: u8 = 1;
const LEVEL_INFO: u8 = 2;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum LogMessage {
    Line(String),
    Flush(Sender<()>),
}

/* =========================
   PUBLIC API
   ========================= */

/// Starts the writer thread. `console` mirrors every emitted line to stderr.
pub fn init(debug: bool, level: &str, console: bool) {
    if LOG_TX.get().is_some() {
        panic!("logging::init() called more than once");
    }

    set_debug(debug);
    set_level(level);
    CONSOLE.store(console, Ordering::Relaxed);

    let path = log_path().clone();
    let (tx, rx) = mpsc::channel::<LogMessage>();
    let _ = LOG_TX.set(tx);

    thread::spawn(move || {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("failed to open log file {}: {e}", path.display());
                None
            }
        };

        while let Ok(message) = rx.recv() {
            match message {
                LogMessage::Line(line) => {
                    if let Some(file) = file.as_mut() {
                        let _ = writeln!(file, "{line}");
                        let _ = file.flush();
                    }
                }
                LogMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    });
}

pub fn set_debug(debug: bool) {
    ENABLED.store(debug, Ordering::Relaxed);
}

pub fn set_level(level: &str) {
    LOG_LEVEL.store(level_rank(level), Ordering::Relaxed);
}

/// Blocks until every line queued so far has reached the log file.
pub fn flush() {
    let Some(tx) = LOG_TX.get() else {
        return;
    };

    let (ack_tx, ack_rx) = mpsc::channel();
    if tx.send(LogMessage::Flush(ack_tx)).is_ok() {
        let _ = ack_rx.recv_timeout(FLUSH_TIMEOUT);
    }
}

#[inline]
pub fn should_log(level: &str) -> bool {
    if ENABLED.load(Ordering::Relaxed) {
        return true;
    }
    level_rank(level) <= LOG_LEVEL.load(Ordering::Relaxed)
}

/* =========================
   INTERNAL
   ========================= */

#[inline]
pub fn enqueue(level: &str, msg: String) {
    if let Some(tx) = LOG_TX.get() {
        let ts = timestamp();
        let line = format!("{ts} [{level}] {msg}");
        if CONSOLE.load(Ordering::Relaxed) {
            eprintln!("{line}");
        }
        let _ = tx.send(LogMessage::Line(line));
    }
}

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn level_rank(level: &str) -> u8 {
    match level.trim().to_ascii_lowercase().as_str() {
        "error" => LEVEL_ERROR,
        "warn" | "warning" => LEVEL_WARN,
        _ => LEVEL_INFO,
    }
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("INFO") {
            $crate::logging::enqueue(
                "INFO",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("WARN") {
            $crate::logging::enqueue(
                "WARN",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "ERROR",
            format!($($arg)*)
        );
    }};
}

/* =========================
   PATH
   ========================= */

fn log_path() -> &'static PathBuf {
    LOG_PATH.get_or_init(|| working_dir().join("multi-wallpaper.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_rank_by_severity() {
        assert!(level_rank("error") < level_rank("warn"));
        assert!(level_rank("WARN") < level_rank("info"));
        assert_eq!(level_rank("warning"), LEVEL_WARN);
        assert_eq!(level_rank("trace"), LEVEL_INFO);
    }
}
