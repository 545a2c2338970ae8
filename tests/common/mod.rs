//! Shared test utilities for the Restible test suite.
//!
//! Modules use a blocking HTTP client, so they run on tokio's blocking pool
//! while the wiremock server answers from the async side.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use restible::modules::{
    ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult, ServiceEndpoints,
};
use serde_json::Value;
use wiremock::MockServer;

/// Build module parameters from `(key, value)` pairs
pub fn params(pairs: &[(&str, Value)]) -> ModuleParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Context whose GitHub and Cloudflare endpoints both point at `server`
pub fn context_for(server: &MockServer) -> ModuleContext {
    ModuleContext::new().with_endpoints(ServiceEndpoints {
        github: server.uri(),
        cloudflare: server.uri(),
    })
}

/// Run a built-in module off the async runtime.
pub async fn run_module(
    name: &'static str,
    params: ModuleParams,
    context: ModuleContext,
) -> ModuleResult<ModuleOutput> {
    tokio::task::spawn_blocking(move || {
        ModuleRegistry::with_builtins().execute(name, &params, &context)
    })
    .await
    .expect("module task panicked")
}

/// JSON bodies of every request the server received for `method` and `path`
pub async fn request_bodies(server: &MockServer, method: &str, path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

/// Number of requests the server received
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// Cloudflare success envelope around `result`
pub fn cf_envelope(result: Value) -> Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
    })
}

/// Cloudflare list envelope for one page
pub fn cf_page(result: Value, page: u32, total_pages: u32) -> Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
        "result_info": {"page": page, "per_page": 50, "total_pages": total_pages},
    })
}
