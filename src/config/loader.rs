// src/config/loader.rs
//! TOML loader for handle options

use crate::config::{ConnectionParametersUpdate, HandleOptions, SessionConfigUpdate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable naming the options file to load.
pub const CONFIG_PATH_ENV: &str = "CEREBUS_CONFIG";

/// Everything a caller can preconfigure from a file: how to reach the device
/// plus the initial session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CerebusOptions {
    /// Device instance id used for open/close.
    pub instance: u16,
    /// Treat a failed connection as a simulated NSP session.
    pub simulate_ok: bool,
    /// Overrides merged over the binding's default connection parameters.
    pub con_params: ConnectionParametersUpdate,
    /// Initial session configuration applied to the handle.
    pub session: SessionConfigUpdate,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named options file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),
    /// The options file is not valid TOML for [`CerebusOptions`].
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// The options file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CerebusOptions {
    /// Parse options from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load options from the path named by `CEREBUS_CONFIG`, falling back to
    /// defaults when the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_toml_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// The constructor options portion of these options.
    pub fn handle_options(&self) -> HandleOptions {
        HandleOptions {
            instance: self.instance,
            con_params: self.con_params.clone(),
            simulate_ok: self.simulate_ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_partial_options() {
        let options = CerebusOptions::from_toml_str(
            r#"
            instance = 1
            simulate_ok = true

            [con_params]
            client-port = 1234

            [session]
            want_comments = false

            [session.buffer]
            continuous_length = 30000
            "#,
        )
        .unwrap();

        assert_eq!(options.instance, 1);
        assert!(options.simulate_ok);
        assert_eq!(options.con_params.client_port, Some(1234));
        assert_eq!(options.session.want_comments, Some(false));
        let buffer = options.session.buffer.as_ref().unwrap();
        assert_eq!(buffer.continuous_length, Some(30_000));
        assert_eq!(buffer.absolute, None);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let options = CerebusOptions::from_toml_str("").unwrap();
        assert_eq!(options, CerebusOptions::default());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = CerebusOptions::from_toml_file("/nonexistent/cerebus.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "instance = 2").unwrap();
        let options = CerebusOptions::from_toml_file(file.path()).unwrap();
        assert_eq!(options.instance, 2);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = CerebusOptions::from_toml_str("instance = [not toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
