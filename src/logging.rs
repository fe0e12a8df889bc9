//! Logging configuration for WMA Lossless Encoder
//!
//! Logs are written to both the terminal and a file at:
//! `~/Library/Logs/WMA-Lossless-Encoder/wma-encoder.log`
//!
//! Users can find this log file to send for debugging purposes.

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_FILE_NAME: &str = "wma-encoder.log";

/// Rotate the log once it grows past this size
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Get the log directory path
/// On macOS: ~/Library/Logs/WMA-Lossless-Encoder/
pub fn get_log_directory() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Logs").join("WMA-Lossless-Encoder"))
    } else {
        // Fallback for other platforms
        dirs::data_local_dir().map(|d| d.join("WMA-Lossless-Encoder").join("logs"))
    }
}

/// Shared format for the terminal and file loggers
fn log_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off) // Don't show thread IDs
        .set_target_level(LevelFilter::Off) // Don't show module targets
        .build()
}

/// Initialize the logging system
///
/// Sets up combined logging to:
/// - Terminal (info, or debug when `verbose`)
/// - File (debug and above, for bug reports)
///
/// Returns the path to the log file on success
pub fn init_logging(verbose: bool) -> Option<PathBuf> {
    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let Some(log_dir) = get_log_directory() else {
        eprintln!("Warning: Could not determine log directory");
        init_terminal_only(term_level);
        return None;
    };

    // Create log directory if it doesn't exist
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_terminal_only(term_level);
        return None;
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    // Rotate old log if it's too large
    rotate_if_larger_than(&log_path, MAX_LOG_BYTES);

    // Open log file (append mode)
    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            // Fall back to terminal-only logging
            init_terminal_only(term_level);
            return None;
        }
    };

    let config = log_config();
    // Set up combined logger (terminal + file)
    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        // Terminal logger - progress lines at info, everything with --verbose
        TermLogger::new(term_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        // File logger - capture debug and above in file
        WriteLogger::new(LevelFilter::Debug, config, log_file),
    ];

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    // Write session start marker
    log::debug!("=== WMA Lossless Encoder session started ===");
    log::debug!("Log file: {}", log_path.display());

    Some(log_path)
}

/// Move `log_path` aside to `<name>.old` once it exceeds `max_bytes`,
/// replacing any previous backup
fn rotate_if_larger_than(log_path: &Path, max_bytes: u64) -> bool {
    let too_large = fs::metadata(log_path).is_ok_and(|m| m.len() > max_bytes);
    if !too_large {
        return false;
    }
    let mut backup = log_path.as_os_str().to_os_string();
    backup.push(".old");
    fs::rename(log_path, PathBuf::from(backup)).is_ok()
}

/// Initialize terminal-only logging (fallback if file logging fails)
fn init_terminal_only(level: LevelFilter) {
    let term_logger = TermLogger::new(level, log_config(), TerminalMode::Mixed, ColorChoice::Auto);
    let _ = CombinedLogger::init(vec![term_logger]);
}
