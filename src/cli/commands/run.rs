//! Run command - Execute one module
//!
//! Parameters come from `-a key=value` pairs and/or an args file (JSON or
//! YAML, optionally wrapped in `ANSIBLE_MODULE_ARGS`). Pairs given on the
//! command line override the file.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use restible::error::Error;
use restible::modules::{redact_params, ModuleOutput, ModuleParams, ModuleRegistry};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Module to run (see `restible list`)
    #[arg(required = true)]
    pub module: String,

    /// Module parameter as key=value (repeatable)
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub args: Vec<String>,

    /// JSON or YAML file with module parameters
    #[arg(long)]
    pub args_file: Option<PathBuf>,
}

/// Check/diff flags Ansible passes inside the args file
#[derive(Debug, Default, PartialEq, Eq)]
struct AnsibleFlags {
    check_mode: bool,
    diff_mode: bool,
}

impl RunArgs {
    /// Execute the run command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ModuleRegistry::with_builtins();
        let no_log: Vec<&'static str> = registry
            .get(&self.module)
            .map(|m| m.no_log_params().to_vec())
            .unwrap_or_default();

        let mut params = match self.load_params() {
            Ok(params) => params,
            Err(e) => {
                ctx.output.module_result(&self.module, &failure(&e));
                return Ok(e.exit_code());
            }
        };
        let flags = take_ansible_flags(&mut params);

        let context = ctx.config.module_context(
            ctx.check_mode || flags.check_mode,
            ctx.diff_mode || flags.diff_mode,
        );
        tracing::debug!(module = %self.module, params = params.len(), "running module");

        let (result, exit_code) = match registry.execute(&self.module, &params, &context) {
            Ok(output) => (output.to_result(), 0),
            Err(e) => {
                let err = Error::module(&self.module, e);
                (failure(&err), err.exit_code())
            }
        };

        let result = with_invocation(result, &params, &no_log);
        ctx.output.module_result(&self.module, &result);
        ctx.output.flush();
        Ok(exit_code)
    }

    /// Collect parameters from the args file and the `-a` pairs.
    fn load_params(&self) -> restible::error::Result<ModuleParams> {
        let mut params = ModuleParams::new();

        if let Some(path) = &self.args_file {
            params.extend(read_args_file(path, &self.module)?);
        }

        for pair in &self.args {
            let (key, value) = parse_pair(pair).ok_or_else(|| {
                Error::module_args(&self.module, format!("expected KEY=VALUE, got '{}'", pair))
            })?;
            params.insert(key, Value::String(value));
        }

        Ok(params)
    }
}

/// Split `key=value`. Values are kept as strings; modules coerce them.
fn parse_pair(pair: &str) -> Option<(String, String)> {
    let (key, value) = pair.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn read_args_file(path: &Path, module: &str) -> restible::error::Result<ModuleParams> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;

    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    let value = match value {
        Value::Object(mut map) => match map.remove("ANSIBLE_MODULE_ARGS") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(ModuleParams::new()),
        _ => Err(Error::module_args(
            module,
            format!("{} must contain a mapping of parameters", path.display()),
        )),
    }
}

/// Remove Ansible's internal `_ansible_*` keys, keeping the check/diff flags.
fn take_ansible_flags(params: &mut ModuleParams) -> AnsibleFlags {
    let flag = |value: Option<Value>| match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    };

    let flags = AnsibleFlags {
        check_mode: flag(params.remove("_ansible_check_mode")),
        diff_mode: flag(params.remove("_ansible_diff")),
    };
    params.retain(|key, _| !key.starts_with("_ansible_"));
    flags
}

fn failure(err: &Error) -> Value {
    ModuleOutput::failed(err.user_message()).to_result()
}

fn with_invocation(mut result: Value, params: &ModuleParams, no_log: &[&str]) -> Value {
    result["invocation"] = json!({ "module_args": redact_params(params, no_log) });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run_args(args: &[&str], args_file: Option<PathBuf>) -> RunArgs {
        RunArgs {
            module: "cloudflare_tunnel".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            args_file,
        }
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("variable_value=a=b"),
            Some(("variable_value".into(), "a=b".into()))
        );
        assert_eq!(parse_pair("empty="), Some(("empty".into(), String::new())));
        assert_eq!(parse_pair("novalue"), None);
        assert_eq!(parse_pair("=x"), None);
    }

    #[test]
    fn test_pairs_override_args_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            r#"{{"ANSIBLE_MODULE_ARGS": {{"name": "web", "account_id": "acc", "state": "present"}}}}"#
        )
        .unwrap();

        let params = run_args(&["state=absent"], Some(file.path().to_path_buf()))
            .load_params()
            .unwrap();
        assert_eq!(params["name"], "web");
        assert_eq!(params["account_id"], "acc");
        assert_eq!(params["state"], "absent");
    }

    #[test]
    fn test_yaml_args_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "name: web\nconfig_src: cloudflare").unwrap();

        let params = run_args(&[], Some(file.path().to_path_buf()))
            .load_params()
            .unwrap();
        assert_eq!(params["config_src"], "cloudflare");
    }

    #[test]
    fn test_args_file_errors() {
        let missing = run_args(&[], Some(PathBuf::from("/nonexistent/args.json")))
            .load_params()
            .unwrap_err();
        assert!(matches!(missing, Error::FileNotFound(_)));

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "[1, 2]").unwrap();
        let not_a_map = run_args(&[], Some(file.path().to_path_buf()))
            .load_params()
            .unwrap_err();
        assert!(matches!(not_a_map, Error::ModuleArgs { .. }));

        let bad_pair = run_args(&["oops"], None).load_params().unwrap_err();
        assert!(bad_pair.to_string().contains("expected KEY=VALUE"));
    }

    #[test]
    fn test_take_ansible_flags() {
        let mut params = ModuleParams::new();
        params.insert("name".into(), json!("web"));
        params.insert("_ansible_check_mode".into(), json!(true));
        params.insert("_ansible_diff".into(), json!("no"));
        params.insert("_ansible_verbosity".into(), json!(3));

        let flags = take_ansible_flags(&mut params);
        assert_eq!(
            flags,
            AnsibleFlags {
                check_mode: true,
                diff_mode: false
            }
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_failure_result() {
        let err = Error::module(
            "cloudflare_tunnel",
            restible::modules::ModuleError::ResourceNotFound("Tunnel 'web'".into()),
        );
        assert_eq!(
            failure(&err),
            json!({"changed": false, "failed": true, "msg": "Tunnel 'web' not found"})
        );
    }

    #[test]
    fn test_invocation_redacts_secrets() {
        let mut params = ModuleParams::new();
        params.insert("api_token".into(), json!("cf-secret"));
        params.insert("name".into(), json!("web"));

        let result = with_invocation(json!({"changed": false}), &params, &["api_token"]);
        assert_eq!(
            result["invocation"]["module_args"]["api_token"],
            "VALUE_SPECIFIED_IN_NO_LOG_PARAMETER"
        );
        assert_eq!(result["invocation"]["module_args"]["name"], "web");
        assert!(!result.to_string().contains("cf-secret"));
    }
}
