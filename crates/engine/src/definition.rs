//! Construction-time checks for command schemas.

use std::collections::HashSet;

use omnicmd_types::{CommandError, CommandSchema, Parameter};
use omnicmd_util::sorted_positionals;
use once_cell::sync::Lazy;
use regex::Regex;

// Arg ids clap claims on every subcommand.
const RESERVED_NAMES: [&str; 1] = ["help"];

static PARAMETER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("parameter name pattern compiles"));

/// Rejects schemas that cannot be projected consistently onto every surface.
pub fn check_schema(schema: &CommandSchema) -> Result<(), CommandError> {
    if schema.name.trim().is_empty() {
        return Err(CommandError::configuration("command name must not be empty"));
    }
    if schema.description.trim().is_empty() {
        return Err(CommandError::configuration(format!(
            "command '{}' must have a description",
            schema.name
        )));
    }
    check_parameters(&schema.name, &schema.parameters)
}

fn check_parameters(command: &str, parameters: &[Parameter]) -> Result<(), CommandError> {
    let mut seen = HashSet::new();
    for param in parameters {
        if !PARAMETER_NAME.is_match(&param.name) {
            return Err(invalid(command, &param.name, "name must be alphanumeric with '-' or '_'"));
        }
        if RESERVED_NAMES.contains(&param.name.as_str()) {
            return Err(invalid(command, &param.name, "name is reserved for the built-in help flag"));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(invalid(command, &param.name, "name is declared more than once"));
        }
        if param.variadic && !param.positional {
            return Err(invalid(command, &param.name, "only positional parameters may be variadic"));
        }
        if let Some(default) = &param.default
            && !param.r#type.accepts(default)
        {
            return Err(invalid(command, &param.name, &format!("default must be a {}", param.r#type)));
        }
        if let Some(pattern) = &param.pattern
            && let Err(error) = Regex::new(pattern)
        {
            return Err(invalid(command, &param.name, &format!("pattern does not compile: {error}")));
        }
    }

    let positionals = sorted_positionals(parameters);
    let variadic_count = positionals.iter().filter(|param| param.variadic).count();
    if variadic_count > 1 {
        return Err(CommandError::configuration(format!(
            "command '{command}' declares more than one variadic parameter"
        )));
    }
    if let Some(index) = positionals.iter().position(|param| param.variadic)
        && index + 1 != positionals.len()
    {
        return Err(invalid(command, &positionals[index].name, "variadic parameter must be the last positional"));
    }
    Ok(())
}

fn invalid(command: &str, parameter: &str, reason: &str) -> CommandError {
    CommandError::configuration(format!("command '{command}' parameter '{parameter}': {reason}"))
}
