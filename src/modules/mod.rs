//! Module system for Restible
//!
//! This module provides the core traits, types, and registry for the Restible module system.
//! Each module reconciles one kind of remote resource against a REST API.

pub mod cloudflare;
pub mod github;
pub mod http;
pub mod reconcile;

use http::HttpSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Placeholder Ansible prints instead of secret parameter values.
pub const NO_LOG_PLACEHOLDER: &str = "VALUE_SPECIFIED_IN_NO_LOG_PARAMETER";

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("parameters are mutually exclusive: {}", .0.join("|"))]
    MutuallyExclusive(Vec<String>),

    #[error("parameters are required together: {}", .0.join(", "))]
    RequiredTogether(Vec<String>),

    #[error("one of the following is required: {}", .0.join(", "))]
    RequiredOneOf(Vec<String>),

    #[error("{service} API error (HTTP {status}): {message}")]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ModuleError {
    /// Whether the remote service answered 404 for the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModuleError::Http { status: 404, .. })
    }

    /// Whether the error was raised while checking parameters, before any request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModuleError::InvalidParameter(_)
                | ModuleError::MissingParameter(_)
                | ModuleError::MutuallyExclusive(_)
                | ModuleError::RequiredTogether(_)
                | ModuleError::RequiredOneOf(_)
        )
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed
    Failed,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Represents a difference between current and desired state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    /// Current state of the resource
    pub before: String,
    /// State the resource will have afterwards
    pub after: String,
}

impl Diff {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Result of a module execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything
    pub changed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    /// Status of the execution
    pub status: ModuleStatus,
    /// Optional diff showing what changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Additional data returned by the module
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl ModuleOutput {
    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Ok,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: msg.into(),
            status: ModuleStatus::Changed,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Failed,
            diff: None,
            data: HashMap::new(),
        }
    }

    /// Add a diff to the output
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Render the flat result object Ansible callers expect.
    ///
    /// Module data is merged at the top level next to `changed` and `msg`;
    /// failures additionally carry `failed: true`.
    pub fn to_result(&self) -> serde_json::Value {
        let mut result = serde_json::Map::new();
        for (key, value) in &self.data {
            result.insert(key.clone(), value.clone());
        }
        result.insert("changed".to_string(), serde_json::json!(self.changed));
        result.insert("msg".to_string(), serde_json::json!(self.msg));
        if self.status == ModuleStatus::Failed {
            result.insert("failed".to_string(), serde_json::json!(true));
        }
        if let Some(diff) = &self.diff {
            result.insert(
                "diff".to_string(),
                serde_json::json!({ "before": diff.before, "after": diff.after }),
            );
        }
        serde_json::Value::Object(result)
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Base URLs of the services modules talk to, unless a module's `api_url` overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub github: String,
    pub cloudflare: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            github: github::DEFAULT_API_URL.to_string(),
            cloudflare: cloudflare::DEFAULT_API_URL.to_string(),
        }
    }
}

/// Context for module execution
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Whether to show diffs
    pub diff_mode: bool,
    /// Settings for the per-invocation HTTP client
    pub http: HttpSettings,
    /// Default API base URLs
    pub endpoints: ServiceEndpoints,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub fn with_http(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }

    pub fn with_endpoints(mut self, endpoints: ServiceEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// Trait that all modules must implement
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Execute the module with the given parameters
    fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let _ = params;
        Ok(())
    }

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }

    /// Parameters whose values must never be echoed or logged
    fn no_log_params(&self) -> &[&'static str] {
        &[]
    }
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_string_required(&self, key: &str) -> ModuleResult<String>;
    fn get_choice(&self, key: &str, choices: &[&str]) -> ModuleResult<Option<String>>;
    fn is_set(&self, key: &str) -> bool;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(v) => Ok(Some(v.to_string().trim_matches('"').to_string())),
        }
    }

    fn get_string_required(&self, key: &str) -> ModuleResult<String> {
        self.get_string(key)?
            .ok_or_else(|| ModuleError::MissingParameter(key.to_string()))
    }

    fn get_choice(&self, key: &str, choices: &[&str]) -> ModuleResult<Option<String>> {
        match self.get_string(key)? {
            Some(value) if choices.contains(&value.as_str()) => Ok(Some(value)),
            Some(value) => Err(ModuleError::InvalidParameter(format!(
                "value of {} must be one of: {}, got: {}",
                key,
                choices.join(", "),
                value
            ))),
            None => Ok(None),
        }
    }

    fn is_set(&self, key: &str) -> bool {
        !matches!(self.get(key), None | Some(serde_json::Value::Null))
    }
}

/// Fail unless every listed parameter is absent or every one is set.
pub fn require_together(params: &ModuleParams, keys: &[&str]) -> ModuleResult<()> {
    let set = keys.iter().filter(|k| params.is_set(k)).count();
    if set != 0 && set != keys.len() {
        return Err(ModuleError::RequiredTogether(
            keys.iter().map(|k| k.to_string()).collect(),
        ));
    }
    Ok(())
}

/// Fail unless at least one of the listed parameters is set.
pub fn require_one_of(params: &ModuleParams, keys: &[&str]) -> ModuleResult<()> {
    if !keys.iter().any(|k| params.is_set(k)) {
        return Err(ModuleError::RequiredOneOf(
            keys.iter().map(|k| k.to_string()).collect(),
        ));
    }
    Ok(())
}

/// Fail when more than one of the listed parameters is set.
pub fn mutually_exclusive(params: &ModuleParams, keys: &[&str]) -> ModuleResult<()> {
    if keys.iter().filter(|k| params.is_set(k)).count() > 1 {
        return Err(ModuleError::MutuallyExclusive(
            keys.iter().map(|k| k.to_string()).collect(),
        ));
    }
    Ok(())
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(github::repo_variable::GithubRepoVariableModule));
        registry.register(Arc::new(cloudflare::tunnel::CloudflareTunnelModule));
        registry.register(Arc::new(cloudflare::zone_ssl::CloudflareZoneSslModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        for param in module.required_params() {
            if !params.is_set(param) {
                return Err(ModuleError::MissingParameter((*param).to_string()));
            }
        }

        module.validate_params(params)?;

        let span = tracing::info_span!("module", name = module.name(), check_mode = context.check_mode);
        let _guard = span.enter();
        module.execute(params, context)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Copy of `params` with every secret value replaced by [`NO_LOG_PLACEHOLDER`].
pub fn redact_params(params: &ModuleParams, no_log: &[&str]) -> ModuleParams {
    params
        .iter()
        .map(|(key, value)| {
            if no_log.contains(&key.as_str()) && !value.is_null() {
                (key.clone(), serde_json::json!(NO_LOG_PLACEHOLDER))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}
