//! Logging for the CLI.
//!
//! Log lines go to stderr so stdout only carries command output. The filter
//! starts at [`BOOTSTRAP_LEVEL`] and is swapped for `logging.level` once the
//! configuration has been read. `RUST_LOG` pins the filter for the whole run.

use anyhow::Context as _;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level in effect until the configuration is loaded.
pub const BOOTSTRAP_LEVEL: &str = "warn";

/// Handle on the installed log filter.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogControl {
    /// Installs the global subscriber.
    ///
    /// If a subscriber is already installed it is kept, and later calls to
    /// [`apply`](Self::apply) report that the filter is gone.
    pub fn install() -> Self {
        let from_env = std::env::var_os("RUST_LOG")
            .is_some()
            .then(|| EnvFilter::try_from_default_env().ok())
            .flatten();
        let pinned = from_env.is_some();
        let filter = from_env.unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_LEVEL));

        let (filter_layer, handle) = reload::Layer::new(filter);
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init();

        Self { handle, pinned }
    }

    /// Switches the filter to `level`, unless `RUST_LOG` pinned it.
    ///
    /// # Errors
    ///
    /// Returns an error if `level` is not a valid filter directive or the
    /// subscriber owning the filter is gone.
    pub fn apply(&self, level: &str) -> anyhow::Result<()> {
        if self.pinned {
            return Ok(());
        }
        let filter =
            EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;
        self.handle
            .reload(filter)
            .context("log filter is no longer installed")
    }
}
