//! Trait listing

use anyhow::Result;

use crate::build::TraitRegistry;

/// Render the trait table: simple traits first, then parameterized ones,
/// each in registration order with help text aligned in one column.
pub fn format_traits(registry: &TraitRegistry) -> String {
    let width = registry.traits().map(|t| t.name.len()).max().unwrap_or(0);

    let mut out = String::from("Traits:\n");
    for def in registry.traits().filter(|t| !t.kind.is_parameterized()) {
        out.push_str(&format!("  {:<width$}  {}\n", def.name, def.help, width = width));
    }

    out.push_str("\nParameterized traits:\n");
    for def in registry.traits().filter(|t| t.kind.is_parameterized()) {
        out.push_str(&format!("  {:<width$}  {}\n", def.name, def.help, width = width));
    }
    out
}

/// Print the built-in traits with their help text
pub fn execute() -> Result<()> {
    print!("{}", format_traits(&TraitRegistry::builtin()?));
    Ok(())
}
