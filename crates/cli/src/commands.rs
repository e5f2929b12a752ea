//! Commands bundled with the `omnicmd` binary.
//!
//! Some are bound eagerly; the rest are lazy and resolve through the shared
//! [`HandlerTable`], which also serves `handler` references in user manifests.

use std::sync::Arc;

use omnicmd_engine::{Command, HandlerLoader, HandlerReference, HandlerTable, handler_fn};
use omnicmd_registry::CommandRegistry;
use omnicmd_types::{
    ApiOptions, CacheControl, CliOptions, CommandError, CommandSchema, HttpMethod, OutputFormatter, OutputType,
    Parameter,
};
use serde_json::{Value, json};

/// Handler modules addressable as `module#export`.
pub fn handler_table() -> HandlerTable {
    let mut table = HandlerTable::new();
    table
        .register(
            "text",
            "echo",
            handler_fn(|args, context| async move {
                let mut words: Vec<String> = args
                    .array("words")
                    .map(|words| words.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                words.extend(context.pass_through.iter().cloned());
                let line = words.join(" ");
                Ok(Value::String(if args.boolean("upper").unwrap_or(false) {
                    line.to_uppercase()
                } else {
                    line
                }))
            }),
        )
        .register(
            "text",
            "reverse",
            handler_fn(|args, _| async move {
                let input = args.str("input").unwrap_or_default();
                Ok(Value::String(input.chars().rev().collect()))
            }),
        )
        .register(
            "stream",
            "count",
            handler_fn(|args, context| async move {
                let to = args.number("to").unwrap_or(3.0) as u64;
                let Some(stream) = context.stream.as_ref() else {
                    return Ok(json!((1..=to).collect::<Vec<_>>()));
                };
                for value in 1..=to {
                    stream.write_line(&value.to_string());
                }
                Ok(Value::Null)
            }),
        )
        .register_value("text", "version", json!(env!("CARGO_PKG_VERSION")));
    table
}

/// Registers the bundled commands. Lazy ones resolve through `loader`.
pub fn register_builtin(registry: &mut CommandRegistry, loader: Arc<dyn HandlerLoader>) -> Result<(), CommandError> {
    registry.register(greet()?);
    registry.register(sum()?);
    registry.register(user_get()?);

    registry.register(Command::lazy(
        CommandSchema::new("text echo", "Print words back")
            .category("text")
            .output(OutputType::Text)
            .param(
                Parameter::array("words")
                    .with_items(Parameter::string("word"))
                    .positional()
                    .variadic()
                    .describe("Words to print"),
            )
            .param(Parameter::boolean("upper").with_alias("u").describe("Uppercase the output"))
            .cli(CliOptions {
                pass_through_options: true,
                ..Default::default()
            })
            .api(ApiOptions {
                method: HttpMethod::Post,
                ..Default::default()
            }),
        HandlerReference::new("text").with_export("echo"),
        Arc::clone(&loader),
    )?);
    registry.register(Command::lazy(
        CommandSchema::new("text reverse", "Reverse a string")
            .category("text")
            .output(OutputType::Text)
            .param(Parameter::string("input").positional().required().describe("Text to reverse")),
        HandlerReference::parse("text#reverse"),
        Arc::clone(&loader),
    )?);
    registry.register(Command::lazy(
        CommandSchema::new("stream count", "Count upward, one line at a time")
            .category("text")
            .output(OutputType::Stream)
            .param(
                Parameter::number("to")
                    .with_default(3)
                    .with_min(1.0)
                    .with_max(1000.0)
                    .describe("Last number to print"),
            )
            .cli(CliOptions {
                streaming: true,
                ..Default::default()
            }),
        HandlerReference::parse("stream#count"),
        loader,
    )?);
    Ok(())
}

fn greet() -> Result<Command, CommandError> {
    let schema = CommandSchema::new("greet", "Say hello")
        .category("general")
        .output(OutputType::Text)
        .param(Parameter::string("name").positional().required().describe("Who to greet"))
        .param(
            Parameter::string("greeting")
                .with_default("Hello")
                .with_alias("g")
                .describe("Greeting word"),
        )
        .param(Parameter::boolean("shout").with_alias("s").describe("Uppercase the greeting"))
        .cli(CliOptions {
            aliases: vec!["hello".to_string()],
            ..Default::default()
        });
    Command::new(
        schema,
        handler_fn(|args, _| async move {
            let greeting = format!(
                "{}, {}!",
                args.str("greeting").unwrap_or("Hello"),
                args.str("name").unwrap_or_default()
            );
            Ok(Value::String(if args.boolean("shout").unwrap_or(false) {
                greeting.to_uppercase()
            } else {
                greeting
            }))
        }),
    )
}

fn sum() -> Result<Command, CommandError> {
    let schema = CommandSchema::new("math sum", "Add numbers")
        .category("math")
        .param(
            Parameter::array("values")
                .with_items(Parameter::number("value"))
                .positional()
                .variadic()
                .required()
                .describe("Numbers to add"),
        )
        .api(ApiOptions {
            method: HttpMethod::Post,
            ..Default::default()
        })
        .cli(CliOptions {
            format: Some(OutputFormatter::new(|value| format!("= {value}"))),
            ..Default::default()
        });
    Command::new(
        schema,
        handler_fn(|args, _| async move {
            let total: f64 = args
                .array("values")
                .map(|values| values.iter().filter_map(Value::as_f64).sum())
                .unwrap_or_default();
            Ok(omnicmd_util::schema::number_value(total))
        }),
    )
}

fn user_get() -> Result<Command, CommandError> {
    let schema = CommandSchema::new("users get", "Fetch a demo user by id")
        .category("users")
        .param(Parameter::number("id").positional().required().with_min(1.0).describe("User id"))
        .param(
            Parameter::string("fields")
                .with_enum(["summary", "full"])
                .with_default("summary")
                .describe("Level of detail"),
        )
        .api(ApiOptions {
            method: HttpMethod::Get,
            path: Some("/users/{id}".to_string()),
            cache: Some(CacheControl {
                max_age: Some(60),
                stale_while_revalidate: Some(30),
                revalidate: None,
            }),
        });
    Command::new(
        schema,
        handler_fn(|args, _| async move {
            let id = args.number("id").unwrap_or_default();
            if id > 100.0 {
                return Err(CommandError::not_found(format!("user {id} not found")));
            }
            let mut user = json!({"id": omnicmd_util::schema::number_value(id), "name": format!("user-{id}")});
            if args.str("fields") == Some("full")
                && let Some(object) = user.as_object_mut()
            {
                object.insert("email".to_string(), json!(format!("user-{id}@example.com")));
            }
            Ok(user)
        }),
    )
}
