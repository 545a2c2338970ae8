//! List command - Show the available modules

use super::CommandContext;
use anyhow::Result;
use restible::modules::ModuleRegistry;

/// Print every registered module with its description
pub fn execute(ctx: &mut CommandContext) -> Result<i32> {
    let registry = ModuleRegistry::with_builtins();
    let rows: Vec<(String, String)> = registry
        .names()
        .into_iter()
        .filter_map(|name| {
            registry
                .get(name)
                .map(|module| (name.to_string(), module.description().to_string()))
        })
        .collect();

    ctx.output.table(["MODULE", "DESCRIPTION"], &rows);
    ctx.output.flush();
    Ok(0)
}
