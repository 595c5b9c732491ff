// repotools-cli/src/rendering.rs
use anyhow::Result;
use colored::*;
use repotools_core::{Registry, ToolDescriptor, ToolResponse};
use std::io::{self, Write};

/// Text reports print as-is; records print as pretty JSON.
pub fn print_response(response: &ToolResponse) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match response {
        ToolResponse::Text(text) => writeln!(out, "{}", text)?,
        ToolResponse::Record(record) => {
            writeln!(out, "{}", serde_json::to_string_pretty(record)?)?
        }
    }
    out.flush()?;
    Ok(())
}

pub fn print_tool_list(registry: &Registry) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "{}", tool_list(registry))?;
    out.flush()?;
    Ok(())
}

/// One line per tool, descriptions aligned in a column.
pub fn tool_list(registry: &Registry) -> String {
    let width = registry
        .descriptors()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0);
    let mut text = String::new();
    for descriptor in registry.descriptors() {
        // Pad before styling; escape codes would count toward the width.
        let name = format!("{:<width$}", descriptor.name, width = width);
        text.push_str(&format!("{}  {}\n", name.bold(), descriptor.description));
    }
    text
}

/// Renders the full schema of one tool.
pub fn describe(descriptor: &ToolDescriptor) -> String {
    let mut text = format!(
        "{}\n{}\n\nResponse: {:?}\nTimeout: {}s\n",
        descriptor.name.bold(),
        descriptor.description,
        descriptor.shape,
        descriptor.timeout.as_secs()
    );
    if descriptor.params.is_empty() {
        text.push_str("Parameters: none\n");
        return text;
    }
    text.push_str("Parameters:\n");
    for spec in &descriptor.params {
        text.push_str(&format!(
            "  {} ({}, default {})  {}\n",
            spec.name.cyan(),
            spec.kind.name(),
            spec.default,
            spec.description
        ));
        if let Some(choices) = &spec.choices {
            text.push_str(&format!("      one of: {}\n", choices.join(", ")));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use repotools_core::{Invoker, ToolContext, ToolsConfig};
    use tempfile::tempdir;

    #[test]
    fn test_describe_lists_choices_and_defaults() {
        colored::control::set_override(false);
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(Invoker::new(dir.path()), ToolsConfig::default());
        let registry = Registry::with_builtin_tools(ctx).unwrap();

        let text = describe(registry.get("run_tests").unwrap());
        println!("Output: {}", text);
        assert!(text.contains("Timeout: 300s"));
        assert!(text.contains("test_type (string, default \"unit\")"));
        assert!(text.contains("one of: unit, e2e, e2e:ui, e2e:headed"));
        assert!(text.contains("coverage (boolean, default false)"));

        let text = describe(registry.get("terraform_status").unwrap());
        assert!(text.contains("Parameters: none"));
    }

    #[test]
    fn test_tool_list_aligns_descriptions_with_colors_on() {
        colored::control::set_override(true);
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(Invoker::new(dir.path()), ToolsConfig::default());
        let registry = Registry::with_builtin_tools(ctx).unwrap();

        let text = tool_list(&registry);
        colored::control::unset_override();
        let width = registry.tool_names().iter().map(|n| n.len()).max().unwrap();
        for (line, descriptor) in text.lines().zip(registry.descriptors()) {
            let padded = format!("{:<width$}", descriptor.name, width = width);
            assert!(line.contains(&padded), "Name not padded in line: {}", line);
            assert!(line.ends_with(&format!("  {}", descriptor.description)));
        }
        assert_eq!(text.lines().count(), registry.tool_names().len());
    }
}
