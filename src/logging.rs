use std::fs::File;
use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use anyhow::Context as _;
use tracing::Level;
use tracing_subscriber::Layer as _;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Files written by the process-wide subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFiles {
    /// Everything from this crate at DEBUG and above.
    pub debug: PathBuf,
    /// ERROR events only.
    pub errors: PathBuf,
}

impl LogFiles {
    pub fn for_run(log_dir: &Path, stamp: &str) -> Self {
        Self {
            debug: log_dir.join(format!("scraper_{stamp}.log")),
            errors: log_dir.join(format!("errors_{stamp}.log")),
        }
    }
}

static INSTALLED: OnceLock<LogFiles> = OnceLock::new();

/// Installs the console, debug-file and error-file layers once per process.
/// Later calls return the files chosen by the first one.
pub fn init(log_dir: &Path) -> anyhow::Result<&'static LogFiles> {
    if let Some(files) = INSTALLED.get() {
        return Ok(files);
    }

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir: {}", log_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let files = LogFiles::for_run(log_dir, &stamp);

    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("build log filter")?;
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let debug_file = File::create(&files.debug)
        .with_context(|| format!("create log file: {}", files.debug.display()))?;
    let debug = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(debug_file))
        .with_filter(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), Level::DEBUG)
                .with_default(Level::INFO),
        );

    let error_file = File::create(&files.errors)
        .with_context(|| format!("create log file: {}", files.errors.display()))?;
    let errors = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(error_file))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console)
        .with(debug)
        .with(errors)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(INSTALLED.get_or_init(|| files))
}
