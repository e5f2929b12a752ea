//! Human readable help and Markdown documentation built from schemas alone.

use omnicmd_types::{CommandSchema, Parameter};
use serde_json::Value;

use crate::usage::{flag_parameters, flag_syntax, positional_syntax, sorted_positionals, usage_line};

const DEFAULT_CATEGORY: &str = "general";

/// Plain text help for one command.
pub fn generate_help(schema: &CommandSchema) -> String {
    let mut out = format!("Usage: {}\n\n{}\n", usage_line(schema), schema.description);

    let positionals = sorted_positionals(&schema.parameters);
    if !positionals.is_empty() {
        let rows: Vec<(String, String)> = positionals
            .iter()
            .map(|param| (positional_syntax(param), describe(param, false)))
            .collect();
        out.push_str("\nArguments:\n");
        out.push_str(&render_rows(&rows));
    }

    let flags = flag_parameters(&schema.parameters);
    if !flags.is_empty() {
        let rows: Vec<(String, String)> = flags.iter().map(|param| (flag_label(param), describe(param, true))).collect();
        out.push_str("\nOptions:\n");
        out.push_str(&render_rows(&rows));
    }

    if !schema.cli.aliases.is_empty() {
        out.push_str(&format!("\nAliases: {}\n", schema.cli.aliases.join(", ")));
    }
    out
}

/// Markdown section documenting one command.
pub fn generate_markdown(schema: &CommandSchema) -> String {
    let mut out = format!("## {}\n\n{}\n", schema.name, schema.description);
    if let Some(category) = &schema.category {
        out.push_str(&format!("\n**Category:** {category}\n"));
    }
    out.push_str(&format!("\n### Usage\n\n```sh\n{}\n```\n", usage_line(schema)));

    let positionals = sorted_positionals(&schema.parameters);
    if !positionals.is_empty() {
        out.push_str("\n### Arguments\n\n| Argument | Type | Description |\n|---|---|---|\n");
        for param in positionals {
            out.push_str(&format!(
                "| `{}` | {} | {} |\n",
                positional_syntax(param),
                param.r#type,
                escape_cell(&param.description)
            ));
        }
    }

    let flags = flag_parameters(&schema.parameters);
    if !flags.is_empty() {
        out.push_str("\n### Options\n\n| Option | Type | Default | Description |\n|---|---|---|---|\n");
        for param in flags {
            let default = param.default.as_ref().map(|value| format!("`{}`", display_value(value))).unwrap_or_default();
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                flag_label(param),
                param.r#type,
                default,
                escape_cell(&describe(param, true))
            ));
        }
    }
    out
}

/// Overview of many commands grouped by category, categories in order of
/// first appearance.
pub fn generate_command_list(schemas: &[&CommandSchema]) -> String {
    let mut categories: Vec<(&str, Vec<&CommandSchema>)> = Vec::new();
    for schema in schemas {
        let category = schema.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
        match categories.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(schema),
            None => categories.push((category, vec![schema])),
        }
    }

    let width = schemas.iter().map(|schema| schema.name.len()).max().unwrap_or(0);
    let mut out = String::from("Available commands:\n");
    for (category, members) in categories {
        out.push_str(&format!("\n{category}:\n"));
        for schema in members {
            out.push_str(&format!("  {:width$}  {}\n", schema.name, schema.description, width = width));
        }
    }
    out
}

fn flag_label(param: &Parameter) -> String {
    let mut names: Vec<String> = param
        .aliases
        .iter()
        .map(|alias| if alias.chars().count() == 1 { format!("-{alias}") } else { format!("--{alias}") })
        .collect();
    names.push(flag_syntax(param));
    names.join(", ")
}

fn describe(param: &Parameter, include_default: bool) -> String {
    let mut text = param.description.clone();
    let mut hints = Vec::new();
    if param.required && param.is_flag() {
        hints.push("required".to_string());
    }
    if !param.enum_values.is_empty() {
        let choices: Vec<String> = param.enum_values.iter().map(display_value).collect();
        hints.push(format!("choices: {}", choices.join(", ")));
    }
    if include_default && let Some(default) = &param.default {
        hints.push(format!("default: {}", display_value(default)));
    }
    if !hints.is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&format!("({})", hints.join("; ")));
    }
    text
}

fn render_rows(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, right)| format!("  {:width$}  {}", left, right, width = width).trim_end().to_string() + "\n")
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
