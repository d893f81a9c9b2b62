//! Session logger — writes all log output to a single file in the OS data directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\ColorMagic\colormagic.log`
//!   Linux:    `~/.local/share/ColorMagic/colormagic.log`
//!   macOS:    `~/Library/Application Support/ColorMagic/colormagic.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the
//! crate. Until `init()` has run (unit tests, headless CLI) the macros are
//! silent no-ops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
/// Write a line to the session log.  Silently ignores I/O errors so that
/// logging never crashes the application.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line to the session log.
pub fn write(level: &str, msg: &str) {
    if LOG_FILE.get().is_none() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Initialise the session logger.  Call once at startup, before the window opens.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init() {
    let path = data_dir().join("ColorMagic").join("colormagic.log");

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // Not fatal: the app runs without a log file
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== ColorMagic session started {} ===",
        human_timestamp()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] PANIC: {}", timestamp(), info));
        prev(info);
    }));
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}
