//! Error types for Restible.
//!
//! Module-level failures are [`ModuleError`](crate::modules::ModuleError);
//! this type wraps them together with the errors of the surrounding CLI
//! (argument files, configuration, I/O).

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Restible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Restible.
#[derive(Error, Debug)]
pub enum Error {
    /// A module failed.
    #[error("Module '{module}' failed: {source}")]
    Module {
        /// Module name
        module: String,
        /// Underlying module error
        #[source]
        source: ModuleError,
    },

    /// Invalid module arguments on the command line or in an args file.
    #[error("Invalid arguments for module '{module}': {message}")]
    ModuleArgs {
        /// Module name
        module: String,
        /// Error message
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new module error.
    pub fn module(module: impl Into<String>, source: ModuleError) -> Self {
        Self::Module {
            module: module.into(),
            source,
        }
    }

    /// Creates a new module args error.
    pub fn module_args(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleArgs {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Message reported to the caller as `msg`.
    ///
    /// Module errors are reported without the module prefix, the way Ansible
    /// prints `fail_json` messages.
    pub fn user_message(&self) -> String {
        match self {
            Error::Module { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Returns the error code for CLI exit status.
    ///
    /// Anything that fails a module invocation exits with 2, the code
    /// Ansible uses for failed tasks; configuration problems exit with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_error_message() {
        let err = Error::module(
            "cloudflare_tunnel",
            ModuleError::ResourceNotFound("Tunnel 'web'".into()),
        );
        assert_eq!(
            err.to_string(),
            "Module 'cloudflare_tunnel' failed: Tunnel 'web' not found"
        );
        assert_eq!(err.user_message(), "Tunnel 'web' not found");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::module_args("x", "bad pair").exit_code(), 2);
        assert_eq!(Error::FileNotFound(PathBuf::from("args.json")).exit_code(), 2);
        assert_eq!(Error::Config("broken".into()).exit_code(), 1);
    }
}
