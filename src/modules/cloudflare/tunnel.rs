//! Cloudflare Tunnel module
//!
//! Creates, updates, deletes or reads a named tunnel in a Cloudflare account.
//!
//! # Parameters
//!
//! - `api_token` (required): Cloudflare API token
//! - `account_id` (required): Account that owns the tunnel
//! - `name` (required): Tunnel name, unique among live tunnels of the account
//! - `config_src`: `local` (default) or `cloudflare`
//! - `tunnel_secret`: Base64 secret. Sent on create and update but never
//!   compared; a random one is generated on create when omitted
//! - `state`: `present` (default), `absent` or `fetched`
//! - `api_url`: Cloudflare API root

use super::{client, page, result, PER_PAGE, SERVICE};
use crate::modules::http::RestClient;
use crate::modules::reconcile::{self, find_paginated, DesiredState, Page, Reconciler};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde_json::{json, Value};

const STATES: &[DesiredState] = &[
    DesiredState::Present,
    DesiredState::Absent,
    DesiredState::Fetched,
];

const CONFIG_SOURCES: &[&str] = &["local", "cloudflare"];

/// Number of random bytes in a generated tunnel secret
pub const SECRET_LEN: usize = 32;

/// Generate a tunnel secret: 32 random bytes, base64 encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// A named tunnel in one account.
pub struct Tunnel<'a> {
    client: &'a RestClient,
    account_id: String,
    name: String,
    config_src: String,
    tunnel_secret: Option<String>,
}

impl<'a> Tunnel<'a> {
    pub fn new(
        client: &'a RestClient,
        account_id: impl Into<String>,
        name: impl Into<String>,
        config_src: impl Into<String>,
        tunnel_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            name: name.into(),
            config_src: config_src.into(),
            tunnel_secret,
        }
    }

    fn list_page(&self, page_number: u32) -> ModuleResult<Page<Value>> {
        let response = self.client.get(
            &["accounts", self.account_id.as_str(), "cfd_tunnel"],
            &[
                ("name", self.name.clone()),
                ("is_deleted", "false".to_string()),
                ("page", page_number.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ],
        )?;
        page(response, page_number)
    }

    fn id<'v>(&self, current: &'v Value) -> ModuleResult<&'v str> {
        current
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::Api {
                service: SERVICE,
                message: format!("tunnel '{}' has no id", self.name),
            })
    }
}

/// Live tunnels have no `deleted_at` (or a null one).
fn is_live(tunnel: &Value) -> bool {
    tunnel.get("deleted_at").map_or(true, Value::is_null)
}

/// Config source the API reports, from `config_src` or the `remote_config` flag.
fn current_config_src(tunnel: &Value) -> Option<&str> {
    if let Some(src) = tunnel.get("config_src").and_then(Value::as_str) {
        return Some(src);
    }
    tunnel
        .get("remote_config")
        .and_then(Value::as_bool)
        .map(|remote| if remote { "cloudflare" } else { "local" })
}

impl Reconciler for Tunnel<'_> {
    fn kind(&self) -> &'static str {
        "tunnel"
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn lookup(&self) -> ModuleResult<Option<Value>> {
        find_paginated(
            |page_number| self.list_page(page_number),
            |tunnel| {
                tunnel.get("name").and_then(Value::as_str) == Some(self.name.as_str())
                    && is_live(tunnel)
            },
        )
    }

    fn equals(&self, current: &Value) -> bool {
        match current_config_src(current) {
            Some(src) => src == self.config_src,
            None => true,
        }
    }

    fn create(&self) -> ModuleResult<Value> {
        let secret = self.tunnel_secret.clone().unwrap_or_else(generate_secret);
        let body = json!({
            "name": self.name,
            "config_src": self.config_src,
            "tunnel_secret": secret,
        });
        result(
            self.client
                .post(&["accounts", self.account_id.as_str(), "cfd_tunnel"], &body)?,
        )
    }

    fn update(&self, current: &Value) -> ModuleResult<Value> {
        let id = self.id(current)?;
        let mut body = json!({
            "name": self.name,
            "config_src": self.config_src,
        });
        if let Some(secret) = &self.tunnel_secret {
            body["tunnel_secret"] = json!(secret);
        }
        result(
            self.client
                .patch(&["accounts", self.account_id.as_str(), "cfd_tunnel", id], &body)?,
        )
    }

    fn delete(&self, current: &Value) -> ModuleResult<()> {
        let id = self.id(current)?;
        let response = self
            .client
            .delete(&["accounts", self.account_id.as_str(), "cfd_tunnel", id])?;
        if !response.body.is_null() {
            result(response)?;
        }
        Ok(())
    }

    fn preview(&self, current: Option<&Value>) -> Value {
        let mut preview = current.cloned().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut preview {
            map.insert("name".to_string(), json!(self.name));
            map.insert("config_src".to_string(), json!(self.config_src));
        }
        preview
    }
}

/// Module for Cloudflare Tunnels
pub struct CloudflareTunnelModule;

impl CloudflareTunnelModule {
    fn state(params: &ModuleParams) -> ModuleResult<DesiredState> {
        match params.get_string("state")? {
            Some(state) => DesiredState::parse(&state, STATES),
            None => Ok(DesiredState::Present),
        }
    }
}

impl Module for CloudflareTunnelModule {
    fn name(&self) -> &'static str {
        "cloudflare_tunnel"
    }

    fn description(&self) -> &'static str {
        "Manage Cloudflare Tunnels"
    }

    fn required_params(&self) -> &[&'static str] {
        &["api_token", "account_id", "name"]
    }

    fn no_log_params(&self) -> &[&'static str] {
        &["api_token", "tunnel_secret"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        Self::state(params)?;
        params.get_choice("config_src", CONFIG_SOURCES)?;
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let state = Self::state(params)?;
        let config_src = params
            .get_choice("config_src", CONFIG_SOURCES)?
            .unwrap_or_else(|| "local".to_string());

        let client = client(params, context)?;
        let tunnel = Tunnel::new(
            &client,
            params.get_string_required("account_id")?,
            params.get_string_required("name")?,
            config_src,
            params.get_string("tunnel_secret")?,
        );

        let outcome = match state {
            DesiredState::Present => reconcile::ensure_present(&tunnel, context.check_mode)?,
            DesiredState::Absent => reconcile::ensure_absent(&tunnel, context.check_mode)?,
            DesiredState::Fetched => {
                let found = reconcile::fetch_one(&tunnel)?;
                return Ok(ModuleOutput::ok("Tunnel fetched").with_data("tunnel", found));
            }
        };

        let msg = outcome.message(tunnel.kind());
        let mut output = if outcome.changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };
        if context.diff_mode {
            if let Some(diff) = outcome.diff() {
                output = output.with_diff(diff);
            }
        }

        match (outcome.action, outcome.resource) {
            (reconcile::Action::Delete, _) | (_, None) => Ok(output),
            (_, Some(resource)) => Ok(output.with_data("tunnel", resource)),
        }
    }
}
