//! Listener configuration.
//!
//! ```toml
//! listen = "0.0.0.0:8081"
//! log_level = "debug"
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the server binds. Default `0.0.0.0:8081`.
    pub listen: SocketAddr,
    /// `tracing` filter used when `RUST_LOG` is unset. Default `info`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8081)),
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn reads_all_keys() {
        let config = Config::from_toml_str(
            r#"
            listen = "127.0.0.1:9000"
            log_level = "hostmux=trace"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_level, "hostmux=trace");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_addresses() {
        assert!(matches!(Config::from_toml_str("port = 80"), Err(Error::Config(_))));
        assert!(matches!(
            Config::from_toml_str(r#"listen = "nowhere""#),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn load_reports_missing_file_as_io() {
        let err = Config::load("/definitely/not/here.toml").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
