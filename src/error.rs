// src/error.rs
//! Unified error type for the connection layer

use crate::sdk::types::{ResultCode, SdkError};
use thiserror::Error;

/// Everything that can go wrong in this crate.
///
/// The vendor SDK reports failures as numeric result codes; those surface
/// here as [`CbError::Transport`] with the code preserved. Configuration
/// problems never reach the device and carry no code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CbError {
    /// A binding call returned a non-success result code.
    #[error("{op} failed with cbsdk error {code}: {message}")]
    Transport {
        /// The binding call that failed.
        op: &'static str,
        /// Vendor result code.
        code: ResultCode,
        /// Human-readable description from the binding.
        message: String,
    },

    /// The caller supplied a configuration value the handle cannot use.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the value.
        reason: String,
    },

    /// The operation requires a live connection.
    #[error("not connected to an NSP")]
    NotConnected,
}

impl CbError {
    pub(crate) fn transport(op: &'static str, err: SdkError) -> Self {
        Self::Transport {
            op,
            code: err.code,
            message: err.message,
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Numeric code for callers keeping the vendor's sentinel convention:
    /// the vendor result code for transport failures, −1 otherwise.
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Transport { code, .. } => *code,
            Self::InvalidConfig { .. } | Self::NotConnected => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_keep_the_vendor_code() {
        let err = CbError::transport("trial_event", SdkError::new(-30, "instrument absent"));
        assert_eq!(err.code(), -30);
        assert_eq!(
            err.to_string(),
            "trial_event failed with cbsdk error -30: instrument absent"
        );
    }

    #[test]
    fn non_transport_errors_map_to_the_sentinel() {
        assert_eq!(CbError::NotConnected.code(), -1);
        assert_eq!(CbError::invalid_config("not a mapping").code(), -1);
    }
}
