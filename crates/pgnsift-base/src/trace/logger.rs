use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGING_SYSTEM: OnceCell<LoggingSystem> = OnceCell::new();

/// Logging goes to stderr by default, filtered by RUST_LOG, and can be
/// redirected to a file (the -l/-L command line options).
pub struct LoggingSystem {
    file: Mutex<Option<std::fs::File>>,
}

impl LoggingSystem {
    pub fn instance() -> Result<&'static Self> {
        LOGGING_SYSTEM.get_or_try_init(LoggingSystem::new)
    }

    pub fn init() -> Result<()> {
        let _ = LoggingSystem::instance()?;
        Ok(())
    }

    fn new() -> Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // a subscriber may already be installed when running under the
        // test harness
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .try_init();
        info!("logging enabled");
        Ok(LoggingSystem { file: Mutex::new(None) })
    }

    /// route subsequent report lines to a file instead of stderr;
    /// append selects open mode
    pub fn set_log_file(&self, path: impl AsRef<Path>, append: bool) -> Result<()> {
        let f = if append {
            crate::infra::utils::file_append(&path)?
        } else {
            crate::infra::utils::file_create(&path)?
        };
        info!("logging reports to '{}'", path.as_ref().display());
        *self.file.lock().unwrap() = Some(f);
        Ok(())
    }

    /// report lines (per-game diagnostics) go to the log file when one is
    /// set, otherwise stderr
    pub fn report(&self, line: &str) {
        use std::io::Write;
        let mut guard = self.file.lock().unwrap();
        match &mut *guard {
            Some(f) => {
                let _ = writeln!(f, "{line}");
            }
            None => eprintln!("{line}"),
        }
    }
}
