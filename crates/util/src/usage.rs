//! Argument notation shared by the CLI and help projectors.
//!
//! Positional parameters are ordered by `position` ascending, with
//! parameters lacking a position placed after all positioned ones in
//! declaration order. Notation: `<name>` required, `[name]` optional, and a
//! trailing `...` inside the brackets for variadic parameters.

use omnicmd_types::{CommandSchema, ParamType, Parameter};

/// Positional parameters in invocation order.
pub fn sorted_positionals(parameters: &[Parameter]) -> Vec<&Parameter> {
    let mut positionals: Vec<&Parameter> = parameters.iter().filter(|param| param.positional).collect();
    // sort_by_key is stable, so unpositioned parameters keep declaration order
    positionals.sort_by_key(|param| (param.position.is_none(), param.position.unwrap_or(u32::MAX)));
    positionals
}

/// Flag parameters in declaration order.
pub fn flag_parameters(parameters: &[Parameter]) -> Vec<&Parameter> {
    parameters.iter().filter(|param| param.is_flag()).collect()
}

pub fn positional_syntax(param: &Parameter) -> String {
    match (param.variadic, param.required) {
        (true, true) => format!("<{}...>", param.name),
        (true, false) => format!("[{}...]", param.name),
        (false, true) => format!("<{}>", param.name),
        (false, false) => format!("[{}]", param.name),
    }
}

pub fn flag_syntax(param: &Parameter) -> String {
    if param.r#type == ParamType::Boolean {
        format!("--{}", param.name)
    } else if param.required {
        format!("--{} <{}>", param.name, param.name)
    } else {
        format!("--{} [{}]", param.name, param.name)
    }
}

/// Full usage line, e.g. `git commit <message> [files...] [options]`.
pub fn usage_line(schema: &CommandSchema) -> String {
    let mut parts = schema.path_segments();
    parts.extend(sorted_positionals(&schema.parameters).into_iter().map(positional_syntax));
    if schema.parameters.iter().any(Parameter::is_flag) {
        parts.push("[options]".to_string());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positionals_sort_by_position_with_unset_last() {
        let params = vec![
            Parameter::string("c").positional(),
            Parameter::string("b").at_position(2),
            Parameter::string("flag"),
            Parameter::string("d").positional(),
            Parameter::string("a").at_position(1),
        ];
        let names: Vec<&str> = sorted_positionals(&params).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn bracket_notation_covers_all_shapes() {
        assert_eq!(positional_syntax(&Parameter::array("files").variadic().required()), "<files...>");
        assert_eq!(positional_syntax(&Parameter::array("files").variadic()), "[files...]");
        assert_eq!(positional_syntax(&Parameter::string("name").positional().required()), "<name>");
        assert_eq!(positional_syntax(&Parameter::string("name").positional()), "[name]");
    }

    #[test]
    fn flag_notation_depends_on_type_and_required() {
        assert_eq!(flag_syntax(&Parameter::boolean("force")), "--force");
        assert_eq!(flag_syntax(&Parameter::string("author").required()), "--author <author>");
        assert_eq!(flag_syntax(&Parameter::number("limit")), "--limit [limit]");
    }

    #[test]
    fn usage_line_joins_path_positionals_and_options() {
        let schema = CommandSchema::new("git commit", "Record changes")
            .param(Parameter::string("message").at_position(0).required())
            .param(Parameter::array("files").variadic())
            .param(Parameter::boolean("amend"));
        assert_eq!(usage_line(&schema), "git commit <message> [files...] [options]");
    }
}
