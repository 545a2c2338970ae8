//! GitHub REST API modules
//!
//! - `repo_variable`: GitHub Actions repository variables

pub mod repo_variable;

use super::http::{Credential, RestClient};
use super::{
    mutually_exclusive, require_one_of, require_together, ModuleContext, ModuleError,
    ModuleParams, ModuleResult, ParamExt,
};
use serde_json::Value;

/// Public GitHub API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Service name used in errors and logs
pub const SERVICE: &str = "GitHub";

/// Headers GitHub asks every REST client to send
const HEADERS: &[(&str, &str)] = &[
    ("accept", "application/vnd.github+json"),
    ("x-github-api-version", "2022-11-28"),
];

/// Check the authentication parameter combinations.
///
/// `username` and `password` go together, and exactly one of `username`
/// or `access_token` must be given.
pub fn validate_auth(params: &ModuleParams) -> ModuleResult<()> {
    require_together(params, &["username", "password"])?;
    require_one_of(params, &["username", "access_token"])?;
    mutually_exclusive(params, &["username", "access_token"])?;
    Ok(())
}

/// Build the credential from already validated parameters.
pub fn credential(params: &ModuleParams) -> ModuleResult<Credential> {
    if let Some(token) = params.get_string("access_token")? {
        return Ok(Credential::Bearer(token));
    }
    Ok(Credential::Basic {
        username: params.get_string_required("username")?,
        password: params.get_string_required("password")?,
    })
}

/// Build a client for this invocation. `api_url` beats the configured default.
pub fn client(params: &ModuleParams, context: &ModuleContext) -> ModuleResult<RestClient> {
    let api_url = params
        .get_string("api_url")?
        .unwrap_or_else(|| context.endpoints.github.clone());
    RestClient::new(SERVICE, &api_url, credential(params)?, &context.http, HEADERS)
}

/// Owner of the target repository: the organization when given, otherwise
/// the login of the authenticated user.
pub fn resolve_owner(client: &RestClient, organization: Option<String>) -> ModuleResult<String> {
    if let Some(org) = organization {
        return Ok(org);
    }

    let response = client.get(&["user"], &[])?;
    response
        .body
        .get("login")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModuleError::Api {
            service: SERVICE,
            message: "authenticated user has no login".to_string(),
        })
}
