//! Logging and output control
//!
//! This module provides the [`Logger`] handle carried by the registry client.
//! Messages become `tracing` events; [`init`] installs a subscriber whose
//! default level follows the quiet/verbose switches.

use tracing_subscriber::EnvFilter;

/// Logger responsible for all diagnostic output of registry operations
#[derive(Debug, Clone, Default)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            tracing::info!("=== {} ===", title);
        }
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::debug!("{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(outcome = "success", "{}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    /// Byte count in binary units, one decimal above bytes
    pub fn format_size(&self, bytes: u64) -> String {
        const UNITS: [&str; 3] = ["KB", "MB", "GB"];
        if bytes < 1024 {
            return format!("{} B", bytes);
        }
        let mut value = bytes as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins over the switches. Calling this more than once is harmless.
pub fn init(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "oci_transfer=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured(f: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_quiet_logger_still_reports_errors() {
        let output = captured(|| {
            let logger = Logger::new_quiet();
            logger.step("uploading layer");
            logger.error("Push of demo:v1 aborted");
        });
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("Push of demo:v1 aborted"));
        assert!(!output.contains("uploading layer"));
    }

    #[test]
    fn test_format_size() {
        let logger = Logger::new(false);
        assert_eq!(logger.format_size(904), "904 B");
        assert_eq!(logger.format_size(5000), "4.9 KB");
        assert_eq!(logger.format_size(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(logger.format_size(2 * 1024 * 1024 * 1024), "2.0 GB");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(true, false);
        init(false, true);
        Logger::new_quiet().info("not shown");
    }
}
