use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub mod logger {
    use super::*;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    pub fn init_tracing() {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "nft_swap_client=info".into()))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init();
    }

    /// Appends one line to the activity log, creating the file and its
    /// directory on first use.
    pub fn log_new_line(path: &Path, line: &str) -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;

        writeln!(file, "{}", line.trim_end())?;
        Ok(())
    }

    /// Like `log_new_line`, but a failed write only warns.
    pub fn record(path: &Path, line: &str) {
        if let Err(err) = log_new_line(path, line) {
            tracing::warn!("Could not write activity log {}: {}", path.display(), err);
        }
    }
}
