//! Centralized error types for the Chaser core library.
//!
//! Errors here surface configuration and wiring problems to the embedding
//! process. The frame pipeline itself never fails: invariant breaches inside
//! the core are defensively clamped or dropped at the smallest affected unit
//! (see the render builder and outputs).

use thiserror::Error;

/// Application-wide error type for the Chaser core.
#[derive(Debug, Error)]
pub enum ChaserError {
    /// Referenced environment id is not present in the runtime config.
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    /// Referenced program id is not present in the program store.
    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    /// Runtime configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An output target could not be initialized (socket bind, bad address).
    #[error("Output init failed for '{output}': {reason}")]
    OutputInit {
        /// Output id from the environment config.
        output: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Errors from loading the three-file JSON runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("Failed to read {file}: {source}")]
    Io {
        /// File name relative to the data directory.
        file: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config file contained malformed JSON or an unexpected schema.
    #[error("Failed to parse {file}: {source}")]
    Parse {
        /// File name relative to the data directory.
        file: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

/// Convenient Result alias for application-wide operations.
pub type ChaserResult<T> = Result<T, ChaserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_subject() {
        let err = ChaserError::UnknownEnvironment("stage".into());
        assert_eq!(err.to_string(), "Unknown environment: stage");

        let err = ChaserError::OutputInit {
            output: "artnet-1".into(),
            reason: "bind failed".into(),
        };
        assert!(err.to_string().contains("artnet-1"));
        assert!(err.to_string().contains("bind failed"));
    }
}
