//! Desired-state reconciliation shared by every API module
//!
//! A module describes one remote resource type by implementing [`Reconciler`];
//! the drivers in this file ([`ensure_present`], [`ensure_absent`], [`fetch`])
//! hold the lookup / diff / mutate branching once for all of them, including
//! check mode handling.

use super::{Diff, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Target lifecycle state requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Resource should exist with the desired values
    #[default]
    Present,
    /// Resource should not exist
    Absent,
    /// Read the resource without changing it
    Fetched,
}

impl DesiredState {
    /// Parse a state, accepting only the states listed in `allowed`.
    pub fn parse(s: &str, allowed: &[DesiredState]) -> ModuleResult<Self> {
        let state = match s.to_lowercase().as_str() {
            "present" => Some(DesiredState::Present),
            "absent" => Some(DesiredState::Absent),
            "fetched" => Some(DesiredState::Fetched),
            _ => None,
        };

        match state {
            Some(state) if allowed.contains(&state) => Ok(state),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid state '{}'. Valid states: {}",
                s,
                allowed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
            DesiredState::Fetched => write!(f, "fetched"),
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// 1-based page number
    pub page: u32,
    /// Total number of pages the listing reports
    pub total_pages: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Build a page; a missing page count means the listing has a single page.
    pub fn new(page: u32, total_pages: Option<u32>, items: Vec<T>) -> Self {
        Self {
            page,
            total_pages: total_pages.unwrap_or(1),
            items,
        }
    }

    /// Page with no items, ending any scan
    pub fn empty(page: u32) -> Self {
        Self::new(page, None, Vec::new())
    }

    /// Whether a scan should stop after this page
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.page >= self.total_pages
    }
}

/// Scan pages 1, 2, ... and return the first item matching `predicate`.
///
/// Stops at the first match without requesting later pages. Any error
/// from `fetch_page` aborts the scan.
pub fn find_paginated<T, F, P>(mut fetch_page: F, predicate: P) -> ModuleResult<Option<T>>
where
    F: FnMut(u32) -> ModuleResult<Page<T>>,
    P: Fn(&T) -> bool,
{
    let mut page_number = 1;
    loop {
        let page = fetch_page(page_number)?;
        let last = page.is_last();
        if let Some(found) = page.items.into_iter().find(|item| predicate(item)) {
            return Ok(Some(found));
        }
        if last {
            return Ok(None);
        }
        page_number += 1;
    }
}

/// Collect every item of every page, in page order.
pub fn collect_paginated<T, F>(mut fetch_page: F) -> ModuleResult<Vec<T>>
where
    F: FnMut(u32) -> ModuleResult<Page<T>>,
{
    let mut items = Vec::new();
    let mut page_number = 1;
    loop {
        let page = fetch_page(page_number)?;
        let last = page.is_last();
        items.extend(page.items);
        if last {
            return Ok(items);
        }
        page_number += 1;
    }
}

/// What a reconciliation did (or would do in check mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    /// Remote state already matched
    NoOp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
            Action::NoOp => write!(f, "no-op"),
        }
    }
}

/// Payload returned by a `fetched` run
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Single-resource style
    One(Value),
    /// List style; empty is a valid answer
    Many(Vec<Value>),
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub action: Action,
    pub changed: bool,
    /// Whether the mutation was skipped because of check mode
    pub check_mode: bool,
    /// Remote payload before the run, if the resource existed
    pub before: Option<Value>,
    /// Remote payload after the run (current payload when nothing was applied)
    pub resource: Option<Value>,
    /// Desired payload, for diffs
    pub planned: Option<Value>,
}

impl Outcome {
    fn unchanged(action: Action, resource: Option<Value>) -> Self {
        Self {
            action,
            changed: false,
            check_mode: false,
            before: resource.clone(),
            resource,
            planned: None,
        }
    }

    /// Standard message for this outcome, e.g. "Tunnel created".
    pub fn message(&self, kind: &str) -> String {
        let verb = match self.action {
            Action::Create => "created",
            Action::Update => "updated",
            Action::Delete => "deleted",
            Action::NoOp if self.resource.is_some() => {
                return format!("{} is up to date", capitalize(kind))
            }
            Action::NoOp => return format!("{} does not exist", capitalize(kind)),
        };
        if self.check_mode {
            format!("Would have {} {} (check mode)", verb, kind)
        } else {
            format!("{} {}", capitalize(kind), verb)
        }
    }

    /// Before/after diff for a create or update, rendered as pretty JSON.
    pub fn diff(&self) -> Option<Diff> {
        if !self.changed || !matches!(self.action, Action::Create | Action::Update) {
            return None;
        }
        let before = self.before.as_ref().map(pretty).unwrap_or_default();
        let after = self.planned.as_ref().map(pretty).unwrap_or_default();
        Some(Diff::new(before, after))
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// One remote resource type, bound to a client and the caller's desired values.
pub trait Reconciler {
    /// Resource kind for messages, e.g. "tunnel"
    fn kind(&self) -> &'static str;

    /// Natural key of the resource as the remote service knows it
    fn key(&self) -> &str;

    /// Current remote state, `None` when the resource does not exist
    fn lookup(&self) -> ModuleResult<Option<Value>>;

    /// Whether `current` already has every comparable desired value.
    /// Write-only fields never take part in this comparison.
    fn equals(&self, current: &Value) -> bool;

    fn create(&self) -> ModuleResult<Value>;

    fn update(&self, current: &Value) -> ModuleResult<Value>;

    fn delete(&self, current: &Value) -> ModuleResult<()>;

    /// Desired payload without write-only fields, used for diffs
    fn preview(&self, current: Option<&Value>) -> Value;

    /// Read-only view. Defaults to single-resource style, failing when missing.
    fn fetch(&self) -> ModuleResult<Fetched> {
        fetch_one(self).map(Fetched::One)
    }
}

/// Make sure the resource exists with the desired values.
pub fn ensure_present<R: Reconciler + ?Sized>(
    reconciler: &R,
    check_mode: bool,
) -> ModuleResult<Outcome> {
    match reconciler.lookup()? {
        None => {
            let planned = Some(reconciler.preview(None));
            if check_mode {
                tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "would create");
                return Ok(Outcome {
                    action: Action::Create,
                    changed: true,
                    check_mode: true,
                    before: None,
                    resource: None,
                    planned,
                });
            }

            tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "creating");
            let created = reconciler.create()?;
            Ok(Outcome {
                action: Action::Create,
                changed: true,
                check_mode: false,
                before: None,
                resource: Some(created),
                planned,
            })
        }
        Some(current) if reconciler.equals(&current) => {
            tracing::debug!(kind = reconciler.kind(), key = reconciler.key(), "already up to date");
            Ok(Outcome::unchanged(Action::NoOp, Some(current)))
        }
        Some(current) => {
            let planned = Some(reconciler.preview(Some(&current)));
            if check_mode {
                tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "would update");
                return Ok(Outcome {
                    action: Action::Update,
                    changed: true,
                    check_mode: true,
                    before: Some(current.clone()),
                    resource: Some(current),
                    planned,
                });
            }

            tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "updating");
            let updated = reconciler.update(&current)?;
            Ok(Outcome {
                action: Action::Update,
                changed: true,
                check_mode: false,
                before: Some(current),
                resource: Some(updated),
                planned,
            })
        }
    }
}

/// Make sure the resource does not exist.
///
/// A 404 from the delete call means somebody else removed it after the
/// lookup, which is the state we wanted.
pub fn ensure_absent<R: Reconciler + ?Sized>(
    reconciler: &R,
    check_mode: bool,
) -> ModuleResult<Outcome> {
    let Some(current) = reconciler.lookup()? else {
        tracing::debug!(kind = reconciler.kind(), key = reconciler.key(), "already absent");
        return Ok(Outcome::unchanged(Action::NoOp, None));
    };

    if check_mode {
        tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "would delete");
        return Ok(Outcome {
            action: Action::Delete,
            changed: true,
            check_mode: true,
            before: Some(current.clone()),
            resource: Some(current),
            planned: None,
        });
    }

    tracing::info!(kind = reconciler.kind(), key = reconciler.key(), "deleting");
    match reconciler.delete(&current) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(
                kind = reconciler.kind(),
                key = reconciler.key(),
                "resource disappeared before delete"
            );
        }
        Err(e) => return Err(e),
    }

    Ok(Outcome {
        action: Action::Delete,
        changed: true,
        check_mode: false,
        before: Some(current.clone()),
        resource: Some(current),
        planned: None,
    })
}

/// Read-only; never reports a change.
pub fn fetch<R: Reconciler + ?Sized>(reconciler: &R) -> ModuleResult<Fetched> {
    reconciler.fetch()
}

/// Single-resource read: the current payload, or `ResourceNotFound`.
pub fn fetch_one<R: Reconciler + ?Sized>(reconciler: &R) -> ModuleResult<Value> {
    reconciler.lookup()?.ok_or_else(|| {
        ModuleError::ResourceNotFound(format!(
            "{} '{}'",
            capitalize(reconciler.kind()),
            reconciler.key()
        ))
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
