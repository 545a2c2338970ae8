//! Cloudflare zone SSL setting module
//!
//! Reads or sets the SSL/TLS encryption mode of a zone. The setting always
//! exists, so the only mutation is an update.
//!
//! # Parameters
//!
//! - `api_token` (required): Cloudflare API token
//! - `zone` (required): Zone name, e.g. `example.com`
//! - `state` (required): `present` or `fetched`
//! - `value`: `off`, `flexible`, `full` or `strict`; required for `present`
//! - `api_url`: Cloudflare API root

use super::{client, result, zone_id};
use crate::modules::http::RestClient;
use crate::modules::reconcile::{self, DesiredState, Reconciler};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde_json::{json, Value};

const STATES: &[DesiredState] = &[DesiredState::Present, DesiredState::Fetched];

/// Accepted SSL modes
pub const SSL_MODES: &[&str] = &["off", "flexible", "full", "strict"];

/// The SSL setting of one zone.
pub struct ZoneSsl<'a> {
    client: &'a RestClient,
    zone: String,
    zone_id: String,
    value: Option<String>,
}

impl<'a> ZoneSsl<'a> {
    /// Look the zone up by name and bind to its SSL setting.
    pub fn resolve(
        client: &'a RestClient,
        zone: impl Into<String>,
        value: Option<String>,
    ) -> ModuleResult<Self> {
        let zone = zone.into();
        let zone_id = zone_id(client, &zone)?;
        tracing::debug!(zone = %zone, zone_id = %zone_id, "resolved zone");
        Ok(Self {
            client,
            zone,
            zone_id,
            value,
        })
    }

    fn path(&self) -> [&str; 4] {
        ["zones", self.zone_id.as_str(), "settings", "ssl"]
    }
}

impl Reconciler for ZoneSsl<'_> {
    fn kind(&self) -> &'static str {
        "SSL settings"
    }

    fn key(&self) -> &str {
        &self.zone
    }

    fn lookup(&self) -> ModuleResult<Option<Value>> {
        let setting = result(self.client.get(&self.path(), &[])?)?;
        Ok(if setting.is_null() { None } else { Some(setting) })
    }

    fn equals(&self, current: &Value) -> bool {
        current.get("value").and_then(Value::as_str) == self.value.as_deref()
    }

    fn create(&self) -> ModuleResult<Value> {
        Err(ModuleError::Unsupported(format!(
            "zone '{}' has no SSL setting to update",
            self.zone
        )))
    }

    fn update(&self, _current: &Value) -> ModuleResult<Value> {
        let value = self
            .value
            .as_deref()
            .ok_or_else(|| ModuleError::MissingParameter("value".to_string()))?;
        result(self.client.patch(&self.path(), &json!({ "value": value }))?)
    }

    fn delete(&self, _current: &Value) -> ModuleResult<()> {
        Err(ModuleError::Unsupported(
            "the SSL setting of a zone cannot be deleted".to_string(),
        ))
    }

    fn preview(&self, current: Option<&Value>) -> Value {
        let mut preview = current.cloned().unwrap_or_else(|| json!({ "id": "ssl" }));
        if let Value::Object(map) = &mut preview {
            map.insert("value".to_string(), json!(self.value));
        }
        preview
    }
}

/// Module for the Cloudflare zone SSL setting
pub struct CloudflareZoneSslModule;

impl CloudflareZoneSslModule {
    fn state(params: &ModuleParams) -> ModuleResult<DesiredState> {
        DesiredState::parse(&params.get_string_required("state")?, STATES)
    }
}

impl Module for CloudflareZoneSslModule {
    fn name(&self) -> &'static str {
        "cloudflare_zone_ssl"
    }

    fn description(&self) -> &'static str {
        "Manage the SSL/TLS encryption mode of a Cloudflare zone"
    }

    fn required_params(&self) -> &[&'static str] {
        &["api_token", "zone", "state"]
    }

    fn no_log_params(&self) -> &[&'static str] {
        &["api_token"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let state = Self::state(params)?;
        let value = params.get_choice("value", SSL_MODES)?;
        if state == DesiredState::Present && value.is_none() {
            return Err(ModuleError::InvalidParameter(
                "When state is \"present\", value parameter is required".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let state = Self::state(params)?;
        let client = client(params, context)?;
        let setting = ZoneSsl::resolve(
            &client,
            params.get_string_required("zone")?,
            params.get_choice("value", SSL_MODES)?,
        )?;

        match state {
            DesiredState::Fetched => {
                let current = reconcile::fetch_one(&setting)?;
                Ok(ModuleOutput::ok("SSL settings fetched successfully.")
                    .with_data("ssl_settings", current))
            }
            _ => {
                let outcome = reconcile::ensure_present(&setting, context.check_mode)?;
                let mut output = if !outcome.changed {
                    ModuleOutput::ok("SSL settings already up to date.")
                } else if outcome.check_mode {
                    ModuleOutput::changed(outcome.message(setting.kind()))
                } else {
                    ModuleOutput::changed("SSL settings updated successfully.")
                };
                if context.diff_mode {
                    if let Some(diff) = outcome.diff() {
                        output = output.with_diff(diff);
                    }
                }
                let current = outcome.resource.unwrap_or(Value::Null);
                Ok(output.with_data("ssl_settings", current))
            }
        }
    }
}
