//! Cloudflare API v4 modules
//!
//! - `tunnel`: Cloudflare Tunnels (`cfd_tunnel`)
//! - `zone_ssl`: the zone-level SSL/TLS encryption mode
//!
//! Every Cloudflare response is wrapped in the same envelope:
//! `{success, errors, messages, result, result_info}`.

pub mod tunnel;
pub mod zone_ssl;

use super::http::{ApiResponse, Credential, RestClient};
use super::reconcile::{find_paginated, Page};
use super::{ModuleContext, ModuleError, ModuleParams, ModuleResult, ParamExt};
use serde::Deserialize;
use serde_json::Value;

/// Public Cloudflare API root
pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Service name used in errors and logs
pub const SERVICE: &str = "Cloudflare";

/// Page size for list endpoints
pub const PER_PAGE: u32 = 50;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Unwrap an envelope into its `result`, failing on `success: false`.
pub fn result(response: ApiResponse) -> ModuleResult<Value> {
    Ok(envelope(response)?.result)
}

/// Unwrap a list envelope into a [`Page`] of results.
///
/// The page number is the one that was requested; the `page` the server
/// echoes in `result_info` is ignored.
pub fn page(response: ApiResponse, requested: u32) -> ModuleResult<Page<Value>> {
    let envelope = envelope(response)?;
    let items = match envelope.result {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(ModuleError::Api {
                service: SERVICE,
                message: format!("expected a list result, got: {}", other),
            })
        }
    };
    let total_pages = envelope.result_info.and_then(|info| info.total_pages);
    Ok(Page::new(requested, total_pages, items))
}

fn envelope(response: ApiResponse) -> ModuleResult<Envelope> {
    let envelope: Envelope = serde_json::from_value(response.body).map_err(|e| {
        ModuleError::Transport(format!("Unexpected {} response shape: {}", SERVICE, e))
    })?;

    if !envelope.success {
        let message = envelope
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} (code {})", e.message, code),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ModuleError::Api {
            service: SERVICE,
            message: if message.is_empty() {
                "Unknown error".to_string()
            } else {
                message
            },
        });
    }
    Ok(envelope)
}

/// Build a token-authenticated client. `api_url` beats the configured default.
pub fn client(params: &ModuleParams, context: &ModuleContext) -> ModuleResult<RestClient> {
    let api_url = params
        .get_string("api_url")?
        .unwrap_or_else(|| context.endpoints.cloudflare.clone());
    let token = params.get_string_required("api_token")?;
    RestClient::new(SERVICE, &api_url, Credential::Bearer(token), &context.http, &[])
}

/// Resolve a zone name to its id, scanning every page of `GET /zones?name=`.
pub fn zone_id(client: &RestClient, zone: &str) -> ModuleResult<String> {
    let found = find_paginated(
        |page| {
            let response = client.get(
                &["zones"],
                &[
                    ("name", zone.to_string()),
                    ("page", page.to_string()),
                    ("per_page", PER_PAGE.to_string()),
                ],
            )?;
            self::page(response, page)
        },
        |candidate| candidate.get("name").and_then(Value::as_str) == Some(zone),
    )?;

    found
        .as_ref()
        .and_then(|z| z.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModuleError::ResourceNotFound(format!("Zone '{}'", zone)))
}
