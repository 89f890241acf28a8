//! Log output setup.
//!
//! Every crate logs through `tracing`. Nothing is printed until a
//! subscriber is installed, normally with [`init`] at startup.

use tessera_foundation::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Fails if the directive is invalid or a subscriber is already installed.
pub fn try_init(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|err| Error::internal(format!("bad log filter {default_directive:?}: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|err| Error::internal(format!("log subscriber already set: {err}")))
}

/// Like [`try_init`], ignoring failure.
pub fn init(default_directive: &str) {
    let _ = try_init(default_directive);
}

/// Installs a subscriber that writes through the test harness's capture.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
