//! # Restible - Ansible-style modules for REST-managed resources
//!
//! Restible reconciles remote resources against a desired state through
//! their REST APIs, with the semantics Ansible modules have: idempotent
//! runs, a `changed` flag, check mode and diff mode.
//!
//! Built-in modules:
//!
//! - **`github_repo_variable`**: GitHub Actions repository variables
//! - **`cloudflare_tunnel`**: Cloudflare Tunnels
//! - **`cloudflare_zone_ssl`**: the SSL/TLS mode of a Cloudflare zone
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                CLI Interface                 │
//! │         (clap-based command parsing)         │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               Module Registry                │
//! │  (parameter checks, one module per resource) │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                 Reconciler                   │
//! │   (lookup, diff, create / update / delete)   │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │     RestClient (blocking reqwest, per run)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use restible::prelude::*;
//! use serde_json::json;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let mut params = ModuleParams::new();
//! params.insert("api_token".into(), json!("token"));
//! params.insert("account_id".into(), json!("account"));
//! params.insert("name".into(), json!("web"));
//!
//! let context = ModuleContext::new().with_check_mode(true);
//! let output = registry.execute("cloudflare_tunnel", &params, &context)?;
//! println!("changed: {}", output.changed);
//! # Ok::<(), restible::modules::ModuleError>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::modules::reconcile::{DesiredState, Reconciler};
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult, ParamExt,
    };
}

/// Error types and result aliases for Restible operations.
pub mod error;

/// Configuration loading from files and the environment.
pub mod config;

/// Module system: the `Module` trait, registry, HTTP client, reconciliation
/// drivers and the built-in modules.
pub mod modules;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
