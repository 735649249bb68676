//! Subscriber installation for hosts that do not bring their own.
//!
//! Libraries in this workspace only emit `tracing` events. Binaries and test
//! harnesses call [`init`] once at startup. `RUST_LOG` wins over the
//! configured level when set.

use relief_core::{ReliefError, ReliefResult};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install a global `fmt` subscriber.
///
/// # Errors
///
/// [`ReliefError::Config`] if the filter directive is invalid, JSON output is
/// requested without the `tracing-json` feature, or a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> ReliefResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ReliefError::Config(format!("invalid log filter '{}': {e}", config.level))
        })?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Plain => builder.try_init(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init(),
        #[cfg(not(feature = "tracing-json"))]
        LogFormat::Json => {
            return Err(ReliefError::Config(
                "json log format requires the `tracing-json` feature".to_owned(),
            ));
        }
    };
    installed.map_err(|e| ReliefError::Config(format!("cannot install log subscriber: {e}")))
}
