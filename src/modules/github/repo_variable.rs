//! GitHub Actions repository variable module
//!
//! Manages Actions variables on a repository owned by an organization or by
//! the authenticated user.
//!
//! # Parameters
//!
//! - `name` (required): Repository name
//! - `organization`: Repository owner; defaults to the authenticated user
//! - `variable_name`: Variable name, uppercased before use. Required for
//!   `present` and `absent`, an optional filter for `fetched`
//! - `variable_value`: Variable value, required for `present`
//! - `state`: `present` (default), `absent` or `fetched`
//! - `access_token`, or `username` + `password`: credentials
//! - `api_url`: GitHub API root, for GitHub Enterprise
//!
//! # Output
//!
//! `variables` is always a list: the affected variable, or every matching
//! variable for `fetched`.

use super::{client, resolve_owner, validate_auth};
use crate::modules::http::RestClient;
use crate::modules::reconcile::{
    self, collect_paginated, find_paginated, DesiredState, Fetched, Page, Reconciler,
};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde_json::{json, Value};

/// Page size used when listing variables
pub const PER_PAGE: u32 = 30;

const STATES: &[DesiredState] = &[
    DesiredState::Present,
    DesiredState::Absent,
    DesiredState::Fetched,
];

/// One repository variable, or the whole variable list when no name is given.
pub struct RepoVariable<'a> {
    client: &'a RestClient,
    owner: String,
    repo: String,
    name: Option<String>,
    value: Option<String>,
}

impl<'a> RepoVariable<'a> {
    /// `name` is uppercased; GitHub stores variable names in upper case.
    pub fn new(
        client: &'a RestClient,
        owner: impl Into<String>,
        repo: impl Into<String>,
        name: Option<&str>,
        value: Option<String>,
    ) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            name: name.map(str::to_uppercase),
            value,
        }
    }

    fn collection(&self) -> [&str; 4] {
        ["repos", self.owner.as_str(), self.repo.as_str(), "actions"]
    }

    fn variables_path(&self) -> Vec<&str> {
        let mut path = self.collection().to_vec();
        path.push("variables");
        path
    }

    fn variable_path(&self) -> ModuleResult<Vec<&str>> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| ModuleError::MissingParameter("variable_name".to_string()))?;
        let mut path = self.variables_path();
        path.push(name);
        Ok(path)
    }

    fn desired_value(&self) -> ModuleResult<&str> {
        self.value
            .as_deref()
            .ok_or_else(|| ModuleError::MissingParameter("variable_value".to_string()))
    }

    /// One page of `GET .../actions/variables`. A 404 means the repository
    /// has no variables resource and reads as an empty list.
    fn list_page(&self, page: u32) -> ModuleResult<Page<Value>> {
        let response = match self.client.get(
            &self.variables_path(),
            &[("per_page", PER_PAGE.to_string()), ("page", page.to_string())],
        ) {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(Page::empty(page)),
            Err(e) => return Err(e),
        };

        let total_count = response
            .body
            .get("total_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let items = response
            .body
            .get("variables")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total_pages = total_count.div_ceil(u64::from(PER_PAGE));

        Ok(Page::new(
            page,
            Some(u32::try_from(total_pages).unwrap_or(u32::MAX)),
            items,
        ))
    }

    /// Read the variable back after a write so the returned payload is current.
    fn reread(&self) -> ModuleResult<Value> {
        self.lookup()?.ok_or_else(|| {
            ModuleError::ResourceNotFound(format!("Variable '{}'", self.key()))
        })
    }
}

impl Reconciler for RepoVariable<'_> {
    fn kind(&self) -> &'static str {
        "variable"
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or("*")
    }

    fn lookup(&self) -> ModuleResult<Option<Value>> {
        match self.client.get(&self.variable_path()?, &[]) {
            Ok(response) => Ok(Some(response.body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn equals(&self, current: &Value) -> bool {
        current.get("value").and_then(Value::as_str) == self.value.as_deref()
    }

    fn create(&self) -> ModuleResult<Value> {
        let body = json!({ "name": self.key(), "value": self.desired_value()? });
        self.client.post(&self.variables_path(), &body)?;
        self.reread()
    }

    fn update(&self, _current: &Value) -> ModuleResult<Value> {
        let body = json!({ "name": self.key(), "value": self.desired_value()? });
        self.client.patch(&self.variable_path()?, &body)?;
        self.reread()
    }

    fn delete(&self, _current: &Value) -> ModuleResult<()> {
        self.client.delete(&self.variable_path()?)?;
        Ok(())
    }

    fn preview(&self, current: Option<&Value>) -> Value {
        let mut preview = current.cloned().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut preview {
            map.insert("name".to_string(), json!(self.key()));
            map.insert("value".to_string(), json!(self.value));
        }
        preview
    }

    /// Variables are listed, optionally filtered by name. No match is an
    /// empty list, not an error.
    fn fetch(&self) -> ModuleResult<Fetched> {
        let variables = match &self.name {
            Some(name) => find_paginated(
                |page| self.list_page(page),
                |variable| variable.get("name").and_then(Value::as_str) == Some(name.as_str()),
            )?
            .into_iter()
            .collect(),
            None => collect_paginated(|page| self.list_page(page))?,
        };
        Ok(Fetched::Many(variables))
    }
}

/// Module for GitHub Actions repository variables
pub struct GithubRepoVariableModule;

impl GithubRepoVariableModule {
    fn state(params: &ModuleParams) -> ModuleResult<DesiredState> {
        match params.get_string("state")? {
            Some(state) => DesiredState::parse(&state, STATES),
            None => Ok(DesiredState::Present),
        }
    }
}

impl Module for GithubRepoVariableModule {
    fn name(&self) -> &'static str {
        "github_repo_variable"
    }

    fn description(&self) -> &'static str {
        "Manage GitHub Actions repository variables"
    }

    fn required_params(&self) -> &[&'static str] {
        &["name"]
    }

    fn no_log_params(&self) -> &[&'static str] {
        &["password", "access_token"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        validate_auth(params)?;

        let state = Self::state(params)?;
        if matches!(state, DesiredState::Present | DesiredState::Absent)
            && !params.is_set("variable_name")
        {
            return Err(ModuleError::InvalidParameter(format!(
                "When state is \"{}\", variable_name parameter is required",
                state
            )));
        }
        if state == DesiredState::Present && !params.is_set("variable_value") {
            return Err(ModuleError::InvalidParameter(
                "When state is \"present\", variable_value parameter is required".to_string(),
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
        let repo = params.get_string_required("name")?;
        let variable_name = params.get_string("variable_name")?;
        let variable_value = params.get_string("variable_value")?;

        let client = client(params, context)?;
        let owner = resolve_owner(&client, params.get_string("organization")?)?;
        tracing::debug!(owner = %owner, repo = %repo, "resolved repository");

        let variable = RepoVariable::new(
            &client,
            owner,
            repo,
            variable_name.as_deref(),
            variable_value,
        );

        let outcome = match state {
            DesiredState::Present => reconcile::ensure_present(&variable, context.check_mode)?,
            DesiredState::Absent => reconcile::ensure_absent(&variable, context.check_mode)?,
            DesiredState::Fetched => {
                let variables = match reconcile::fetch(&variable)? {
                    Fetched::Many(variables) => variables,
                    Fetched::One(variable) => vec![variable],
                };
                let msg = format!("Found {} variable(s)", variables.len());
                return Ok(ModuleOutput::ok(msg).with_data("variables", json!(variables)));
            }
        };

        let msg = outcome.message(variable.kind());
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

        let variables: Vec<Value> = outcome.resource.into_iter().collect();
        Ok(output.with_data("variables", json!(variables)))
    }
}
