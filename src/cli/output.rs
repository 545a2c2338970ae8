//! Output formatting module for Restible
//!
//! Provides colored human output and the Ansible-style JSON result.

use colored::Colorize;
use serde_json::Value;
use std::io::{self, Write};

/// Module execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Module completed successfully with no changes
    Ok,
    /// Module completed with changes made
    Changed,
    /// Module failed
    Failed,
}

impl TaskStatus {
    /// Status of an Ansible-style result object
    pub fn of(result: &Value) -> Self {
        if result.get("failed").and_then(Value::as_bool) == Some(true) {
            TaskStatus::Failed
        } else if result.get("changed").and_then(Value::as_bool) == Some(true) {
            TaskStatus::Changed
        } else {
            TaskStatus::Ok
        }
    }

    /// Get the colored string representation
    pub fn colored_string(&self) -> String {
        match self {
            TaskStatus::Ok => "ok".green().to_string(),
            TaskStatus::Changed => "changed".yellow().to_string(),
            TaskStatus::Failed => "failed".red().bold().to_string(),
        }
    }

    /// Get the plain string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Ok => "ok",
            TaskStatus::Changed => "changed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Print the result of one module run.
    ///
    /// JSON mode prints the result object alone on stdout. Human mode prints
    /// a status line, the diff when there is one, then the result.
    pub fn module_result(&self, module: &str, result: &Value) {
        if self.json_mode {
            println!("{}", result);
            return;
        }

        let status = TaskStatus::of(result);
        let msg = result.get("msg").and_then(Value::as_str).unwrap_or_default();
        let label = if self.use_color {
            status.colored_string()
        } else {
            status.as_str().to_string()
        };
        println!("{}: [{}] => {}", label, module, msg);

        if let Some(diff) = result.get("diff") {
            self.diff(
                diff.get("before").and_then(Value::as_str).unwrap_or_default(),
                diff.get("after").and_then(Value::as_str).unwrap_or_default(),
            );
        }

        let mut shown = result.clone();
        if let Value::Object(map) = &mut shown {
            map.remove("diff");
            if self.verbosity < 1 {
                map.remove("invocation");
            }
        }
        let rendered = serde_json::to_string_pretty(&shown).unwrap_or_else(|_| shown.to_string());
        if self.use_color && status == TaskStatus::Failed {
            println!("{}", rendered.red());
        } else {
            println!("{}", rendered);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "failed": true,
                "msg": message
            });
            println!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a diff output
    pub fn diff(&self, old: &str, new: &str) {
        println!();
        for line in old.lines() {
            if self.use_color {
                println!("{}", format!("- {}", line).red());
            } else {
                println!("- {}", line);
            }
        }
        for line in new.lines() {
            if self.use_color {
                println!("{}", format!("+ {}", line).green());
            } else {
                println!("+ {}", line);
            }
        }
        println!();
    }

    /// Print a two-column table, or a JSON object in JSON mode
    pub fn table(&self, headers: [&str; 2], rows: &[(String, String)]) {
        if self.json_mode {
            let map: serde_json::Map<String, Value> = rows
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            println!("{}", Value::Object(map));
            return;
        }

        let width = rows
            .iter()
            .map(|(k, _)| k.len())
            .chain(std::iter::once(headers[0].len()))
            .max()
            .unwrap_or(0);

        let header_line = format!("{:width$} | {}", headers[0], headers[1], width = width);
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
            println!("{}", format!("{}-+-{}", "-".repeat(width), "-".repeat(headers[1].len())).bright_black());
        } else {
            println!("{}", header_line);
            println!("{}-+-{}", "-".repeat(width), "-".repeat(headers[1].len()));
        }

        for (key, value) in rows {
            println!("{:width$} | {}", key, value, width = width);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
