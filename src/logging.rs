//! Log subscriber setup.
//!
//! hostmux only emits `tracing` events; installing a subscriber is the
//! application's call. [`init`] is the one-liner for binaries that have no
//! opinion: fmt output, `RUST_LOG` if set, else the given filter.

use tracing_subscriber::EnvFilter;

use crate::error::Error;

/// Installs a global fmt subscriber. Fails if one is already installed.
pub fn init(default_filter: &str) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let _ = init("debug");
        assert!(matches!(init("debug"), Err(Error::Logging(_))));
    }
}
