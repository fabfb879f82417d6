/// Structured logging for the flood question-answering service.
///
/// Provides context-rich logging with data-source tags, timestamps, and
/// severity levels. Supports both console output and file-based logging
/// for unattended batch runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Maps,
    OpenAi,
    Database,
    Selection,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Maps => write!(f, "MAPS"),
            DataSource::OpenAi => write!(f, "OPENAI"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Selection => write!(f, "SELECT"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the service answered but had nothing for us
    /// (no geocoding results, no rows, empty forecast window)
    Expected,
    /// Unexpected failure - indicates service degradation, quota
    /// exhaustion, or an API contract change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        *LOGGER.lock().unwrap() = Some(logger);
    }

    /// Log a message with the global logger
    fn log(&self, level: LogLevel, source: &DataSource, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        // Format the log entry
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, source, context_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, context_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Info, &source, context, message);
    }
}

/// Log a warning message
pub fn warn(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Warning, &source, context, message);
    }
}

/// Log an error message
pub fn error(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Error, &source, context, message);
    }
}

/// Log a debug message
pub fn debug(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Debug, &source, context, message);
    }
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an upstream service failure based on the error message.
///
/// Upstream failures inside context selection are never fatal (the
/// selector recovers with documented fallbacks), but the classification
/// decides whether the recovery is logged quietly or loudly.
pub fn classify_upstream_failure(error_message: &str) -> FailureType {
    // Empty payloads usually mean the service had nothing for this
    // location or query, not that the service is broken
    if error_message.contains("No data available")
        || error_message.contains("no results")
    {
        FailureType::Expected
    }
    // HTTP errors indicate quota, auth, or availability problems
    else if error_message.contains("HTTP error") {
        FailureType::Unexpected
    }
    // Parse errors suggest API changes or bugs
    else if error_message.contains("Parse error") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

/// Log an upstream service failure with automatic classification
pub fn log_upstream_failure(
    source: DataSource,
    context: &str,
    operation: &str,
    err: &dyn std::error::Error,
) {
    let error_msg = err.to_string();
    let failure_type = classify_upstream_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(source, Some(context), &message),
        FailureType::Unexpected => error(source, Some(context), &message),
        FailureType::Unknown => warn(source, Some(context), &message),
    }
}

// ---------------------------------------------------------------------------
// Selection Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a context-selection batch
pub fn log_selection_summary(total: usize, selected: usize, skipped: usize) {
    let message = format!(
        "Selection complete: {}/{} locations filtered, {} skipped",
        selected, total, skipped
    );

    if skipped == 0 {
        info(DataSource::Selection, None, &message);
    } else if selected == 0 {
        error(DataSource::Selection, None, &message);
    } else {
        warn(DataSource::Selection, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_failure_classification() {
        let empty_result = "No data available: geocode returned no results";
        assert_eq!(classify_upstream_failure(empty_result), FailureType::Expected);

        let http_error = "HTTP error: 429";
        assert_eq!(classify_upstream_failure(http_error), FailureType::Unexpected);

        let parse_error = "Parse error: missing field `forecastHours`";
        assert_eq!(classify_upstream_failure(parse_error), FailureType::Unexpected);

        let other = "connection reset by peer";
        assert_eq!(classify_upstream_failure(other), FailureType::Unknown);
    }
}
