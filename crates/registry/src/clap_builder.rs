//! Projection of commands onto a clap command tree, and the action that
//! runs a parsed invocation.

use std::{
    io::IsTerminal,
    sync::Arc,
};

use clap::{
    Arg, ArgAction, ArgMatches, Command as ClapCommand,
    builder::PossibleValuesParser,
    error::{ContextKind, ContextValue, ErrorKind},
    parser::ValueSource,
};
use indexmap::IndexMap;
use omnicmd_engine::Command;
use omnicmd_types::{
    CommandError, CommandSchema, ExecutionContext, Interface, OutputStream, OutputType, ParamType, Parameter, PromptFn,
};
use omnicmd_util::{coerce_str, flag_parameters, generate_command_list, positional_syntax, sorted_positionals};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::CommandRegistry;

/// Exit code for command line usage errors.
pub const EXIT_USAGE: i32 = 64;

const PASS_THROUGH_ID: &str = "__pass_through";
const GLOBAL_FLAGS: [&str; 2] = ["json", "verbose"];

// clap's builder wants 'static strings; the tree is built once per process.
fn leak(value: &str) -> &'static str {
    Box::leak(value.to_string().into_boxed_str())
}

/// A runnable CLI projection of one command.
#[derive(Debug, Clone)]
pub struct CliCommand {
    path: Vec<String>,
    clap: ClapCommand,
    command: Arc<Command>,
}

/// Projects a command onto its CLI form.
pub trait ToCli {
    fn to_cli(&self) -> CliCommand;
}

impl ToCli for Arc<Command> {
    fn to_cli(&self) -> CliCommand {
        to_cli(self)
    }
}

/// Builds the clap subcommand for `command` without touching its handler.
pub fn to_cli(command: &Arc<Command>) -> CliCommand {
    let schema = command.metadata();
    let path = schema.path_segments();
    let leaf = path.last().cloned().unwrap_or_else(|| schema.name.clone());

    let mut clap = ClapCommand::new(leak(&leaf)).about(schema.description.clone());
    for alias in &schema.cli.aliases {
        clap = clap.visible_alias(leak(alias));
    }

    let positionals = sorted_positionals(&schema.parameters);
    let mut optional_seen = false;
    for (index, param) in positionals.iter().enumerate() {
        // clap rejects a required positional after an optional one; the
        // validator still enforces `required` in that case.
        let required = param.required && !optional_seen;
        optional_seen |= !param.required;
        clap = clap.arg(build_positional_argument(param, index + 1, required));
    }
    for param in flag_parameters(&schema.parameters) {
        clap = clap.arg(build_flag_argument(param));
    }
    if schema.cli.pass_through_options {
        clap = clap.arg(
            Arg::new(PASS_THROUGH_ID)
                .index(positionals.len() + 1)
                .num_args(0..)
                .last(true)
                .hide(true)
                .action(ArgAction::Append),
        );
    }

    CliCommand {
        path,
        clap,
        command: command.clone(),
    }
}

fn build_positional_argument(param: &Parameter, index: usize, required: bool) -> Arg {
    let name = leak(&param.name);
    let mut arg = Arg::new(name).index(index).value_name(name).required(required);
    if param.variadic {
        arg = arg.num_args(1..).action(ArgAction::Append);
    }
    if let Some(default) = &param.default {
        arg = arg.default_value(leak(&default_text(default)));
    }
    if let Some(help) = help_text(param) {
        arg = arg.help(help);
    }
    add_enum_values(arg, param)
}

fn build_flag_argument(param: &Parameter) -> Arg {
    let name = leak(&param.name);
    let mut arg = Arg::new(name).long(name);

    arg = match param.r#type {
        ParamType::Boolean => arg.action(ArgAction::SetTrue),
        ParamType::Array => arg.action(ArgAction::Append).value_name(name).required(param.required),
        _ => arg.action(ArgAction::Set).value_name(name).required(param.required),
    };
    if param.r#type != ParamType::Boolean
        && let Some(default) = &param.default
    {
        arg = arg.default_value(leak(&default_text(default)));
    }
    for alias in &param.aliases {
        arg = match short_alias(alias) {
            Some(short) => arg.short(short),
            None => arg.visible_alias(leak(alias)),
        };
    }
    if let Some(help) = help_text(param) {
        arg = arg.help(help);
    }
    add_enum_values(arg, param)
}

fn short_alias(alias: &str) -> Option<char> {
    let mut chars = alias.chars();
    match (chars.next(), chars.next()) {
        // -h and -V belong to clap
        (Some(short), None) if short != 'h' && short != 'V' => Some(short),
        _ => None,
    }
}

fn add_enum_values(arg: Arg, param: &Parameter) -> Arg {
    if param.r#type != ParamType::String || param.enum_values.is_empty() {
        return arg;
    }
    let values: Option<Vec<&'static str>> = param
        .enum_values
        .iter()
        .map(|value| value.as_str().map(leak))
        .collect();
    match values {
        Some(values) => arg.value_parser(PossibleValuesParser::new(values)),
        None => arg,
    }
}

fn help_text(param: &Parameter) -> Option<String> {
    (!param.description.is_empty()).then(|| param.description.clone())
}

fn default_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(default_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

impl CliCommand {
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Full path of the command, leaf included.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path segments above the leaf.
    pub fn ancestors(&self) -> &[String] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    pub fn clap(&self) -> &ClapCommand {
        &self.clap
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Positional notation in invocation order, e.g. `["<message>", "[files...]"]`.
    pub fn argument_syntax(&self) -> Vec<String> {
        sorted_positionals(self.command.parameters())
            .into_iter()
            .map(positional_syntax)
            .collect()
    }

    /// Rebuilds the command's input from parsed matches.
    ///
    /// Positional values are zipped back onto parameter names by position.
    /// Flags are only included when given on the command line, so defaults
    /// are applied by the validator with their declared types.
    pub fn collect_args(&self, matches: &ArgMatches) -> Map<String, Value> {
        let parameters = self.command.parameters();
        let mut args = Map::new();

        for param in sorted_positionals(parameters) {
            if matches.value_source(&param.name) != Some(ValueSource::CommandLine) {
                continue;
            }
            if param.variadic {
                if let Some(values) = matches.get_many::<String>(&param.name) {
                    let items = values.map(|raw| coerce_item(param, raw)).collect();
                    args.insert(param.name.clone(), Value::Array(items));
                }
            } else if let Some(raw) = matches.get_one::<String>(&param.name) {
                args.insert(param.name.clone(), coerce_str(param, raw));
            }
        }

        for param in flag_parameters(parameters) {
            if matches.value_source(&param.name) != Some(ValueSource::CommandLine) {
                continue;
            }
            let value = match param.r#type {
                ParamType::Boolean => Value::Bool(matches.get_flag(&param.name)),
                ParamType::Array => {
                    let items = matches
                        .get_many::<String>(&param.name)
                        .into_iter()
                        .flatten()
                        .flat_map(|raw| match coerce_str(param, raw) {
                            Value::Array(items) => items,
                            other => vec![other],
                        })
                        .collect();
                    Value::Array(items)
                }
                _ => match matches.get_one::<String>(&param.name) {
                    Some(raw) => coerce_str(param, raw),
                    None => continue,
                },
            };
            args.insert(param.name.clone(), value);
        }

        args
    }

    /// Builds the execution context for one invocation.
    pub fn context(&self, environment: &CliEnvironment, global_flags: IndexMap<String, Value>) -> ExecutionContext {
        let cli = &self.command.metadata().cli;
        let mut context = ExecutionContext::new(Interface::Cli)
            .with_stdout(environment.stdout.clone())
            .with_stderr(environment.stderr.clone());
        if cli.streaming {
            context = context.with_stream(environment.stdout.clone());
        }
        if environment.interactive {
            context = context.with_prompt(terminal_prompt());
        }
        if cli.pass_through_options {
            context = context.with_pass_through(environment.pass_through());
        }
        context.global_flags = global_flags;
        context
    }

    /// Executes the command for parsed `matches` and returns the exit code.
    pub async fn run(
        &self,
        matches: &ArgMatches,
        environment: &CliEnvironment,
        global_flags: IndexMap<String, Value>,
    ) -> i32 {
        let args = self.collect_args(matches);
        let context = self.context(environment, global_flags);
        let json_flag = context.global_flag("json");
        debug!(command = %self.command.name(), "running CLI command");

        match self.command.execute(&args, context).await {
            Ok(value) => {
                let rendered = render_output(self.command.metadata(), &value, json_flag);
                if !rendered.is_empty() {
                    environment.stdout.write_line(&rendered);
                }
                0
            }
            Err(error) => {
                warn!(command = %self.command.name(), kind = error.kind(), %error, "CLI command failed");
                environment.stderr.write_line(&error.to_string());
                error.exit_code()
            }
        }
    }
}

fn coerce_item(param: &Parameter, raw: &str) -> Value {
    match param.items.as_deref() {
        Some(items) => coerce_str(items, raw),
        None => Value::String(raw.to_string()),
    }
}

/// Renders a successful result for the terminal.
///
/// A custom formatter wins, then pretty JSON for `json` output or the
/// `--json` flag. Otherwise strings print raw and other values print as
/// JSON text, except `null`, which renders empty so that commands with
/// nothing to report (streaming ones included) print no stray line.
pub fn render_output(schema: &CommandSchema, value: &Value, json_flag: bool) -> String {
    if let Some(format) = &schema.cli.format {
        return format.format(value);
    }
    if schema.output == OutputType::Json || json_flag {
        return serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    }
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn terminal_prompt() -> PromptFn {
    PromptFn::new(|question| {
        Box::pin(async move {
            use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

            let mut stderr = tokio::io::stderr();
            stderr
                .write_all(question.as_bytes())
                .await
                .map_err(|error| CommandError::failed(format!("prompt failed: {error}")))?;
            stderr.flush().await.ok();

            let mut answer = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut answer)
                .await
                .map_err(|error| CommandError::failed(format!("prompt failed: {error}")))?;
            Ok::<_, CommandError>(answer.trim_end_matches(['\r', '\n']).to_string())
        })
    })
}

/// Process-facing pieces of a CLI invocation.
#[derive(Debug, Clone)]
pub struct CliEnvironment {
    /// Full argument vector, program name first.
    pub argv: Vec<String>,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    /// Whether stdout is attached to a terminal.
    pub interactive: bool,
}

impl CliEnvironment {
    pub fn from_process() -> Self {
        Self {
            argv: std::env::args().collect(),
            stdout: OutputStream::Stdout,
            stderr: OutputStream::Stderr,
            interactive: std::io::stdout().is_terminal(),
        }
    }

    /// In-memory streams for tests and embedding.
    pub fn captured<I, T>(argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            stdout: OutputStream::memory(),
            stderr: OutputStream::memory(),
            interactive: false,
        }
    }

    /// Everything after the first literal `--`.
    pub fn pass_through(&self) -> Vec<String> {
        self.argv
            .iter()
            .position(|arg| arg == "--")
            .map(|index| self.argv[index + 1..].to_vec())
            .unwrap_or_default()
    }
}

/// One node of the CLI command forest.
///
/// Intermediate path segments become grouping nodes shared by every command
/// under that prefix. A node may carry a command and children at once.
#[derive(Debug, Clone)]
pub struct CliNode {
    pub name: String,
    pub leaf: Option<CliCommand>,
    pub children: Vec<CliNode>,
}

impl CliNode {
    fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            leaf: None,
            children: Vec::new(),
        }
    }

    fn answers_to(&self, word: &str) -> bool {
        self.name == word
            || self
                .leaf
                .as_ref()
                .is_some_and(|leaf| leaf.clap.get_all_aliases().any(|alias| alias == word))
    }

    pub fn child(&self, name: &str) -> Option<&CliNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// The clap command for this node and its subtree.
    pub fn to_clap(&self) -> ClapCommand {
        let mut clap = match &self.leaf {
            Some(leaf) => leaf.clap.clone(),
            None => ClapCommand::new(leak(&self.name))
                .about(format!("{} commands", self.name))
                .subcommand_required(true)
                .arg_required_else_help(true),
        };
        for child in &self.children {
            clap = clap.subcommand(child.to_clap());
        }
        clap
    }
}

/// Groups commands into a forest keyed by their path prefixes.
pub fn build_command_tree(commands: &[Arc<Command>]) -> Vec<CliNode> {
    let mut roots: Vec<CliNode> = Vec::new();
    for command in commands {
        let cli = to_cli(command);
        let Some((leaf, ancestors)) = cli.path.split_last() else {
            continue;
        };

        let mut siblings = &mut roots;
        for segment in ancestors {
            let index = match siblings.iter().position(|node| &node.name == segment) {
                Some(index) => index,
                None => {
                    siblings.push(CliNode::group(segment));
                    siblings.len() - 1
                }
            };
            siblings = &mut siblings[index].children;
        }

        match siblings.iter_mut().find(|node| &node.name == leaf) {
            Some(node) => node.leaf = Some(cli),
            None => {
                let mut node = CliNode::group(leaf);
                node.leaf = Some(cli);
                siblings.push(node);
            }
        }
    }
    roots
}

/// Root CLI application over a set of commands plus built-in subcommands.
#[derive(Debug, Clone)]
pub struct CliApp {
    name: String,
    about: Option<String>,
    version: Option<String>,
    nodes: Vec<CliNode>,
    builtins: Vec<ClapCommand>,
}

impl CliApp {
    pub fn new(name: impl Into<String>, commands: &[Arc<Command>]) -> Self {
        Self {
            name: name.into(),
            about: None,
            version: None,
            nodes: build_command_tree(commands),
            builtins: Vec::new(),
        }
    }

    pub fn from_registry(name: impl Into<String>, registry: &CommandRegistry) -> Self {
        Self::new(name, &registry.to_vec())
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a subcommand that the embedding binary handles itself.
    pub fn with_subcommand(mut self, subcommand: ClapCommand) -> Self {
        self.builtins.push(subcommand);
        self
    }

    pub fn nodes(&self) -> &[CliNode] {
        &self.nodes
    }

    /// The complete clap tree, global flags included.
    pub fn clap(&self) -> ClapCommand {
        let mut root = ClapCommand::new(leak(&self.name))
            .arg(
                Arg::new("json")
                    .long("json")
                    .help("JSON output")
                    .global(true)
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("verbose")
                    .long("verbose")
                    .help("Verbose logging")
                    .global(true)
                    .action(ArgAction::SetTrue),
            );
        if let Some(about) = &self.about {
            root = root.about(about.clone());
        }
        if let Some(version) = &self.version {
            root = root.version(leak(version));
        }
        for node in &self.nodes {
            root = root.subcommand(node.to_clap());
        }
        for builtin in &self.builtins {
            root = root.subcommand(builtin.clone());
        }
        root
    }

    /// Parses `argv` against the full tree.
    ///
    /// When the invoked command sets `allow_unknown_option`, each argument
    /// clap rejects as unknown is dropped and parsing is retried.
    pub fn try_parse(&self, argv: &[String]) -> Result<ArgMatches, clap::Error> {
        let clap = self.clap();
        let mut argv = argv.to_vec();
        loop {
            let error = match clap.clone().try_get_matches_from(&argv) {
                Ok(matches) => return Ok(matches),
                Err(error) => error,
            };
            match self.unknown_argument_index(&argv, &error) {
                Some(index) => {
                    let ignored = argv.remove(index);
                    debug!(argument = %ignored, "ignoring unknown argument");
                }
                None => return Err(error),
            }
        }
    }

    /// Index in `argv` of the argument behind an unknown-argument error,
    /// provided the invoked command is lenient.
    fn unknown_argument_index(&self, argv: &[String], error: &clap::Error) -> Option<usize> {
        if error.kind() != ErrorKind::UnknownArgument {
            return None;
        }
        let Some(ContextValue::String(invalid)) = error.get(ContextKind::InvalidArg) else {
            return None;
        };
        let (leaf, leaf_index) = self.invoked_leaf(argv)?;
        if !leaf.command.metadata().cli.allow_unknown_option {
            return None;
        }
        let with_value = format!("{invalid}=");
        argv.iter()
            .enumerate()
            .skip(leaf_index + 1)
            .take_while(|(_, arg)| arg.as_str() != "--")
            .find(|(_, arg)| arg == &invalid || arg.starts_with(&with_value))
            .map(|(index, _)| index)
    }

    /// The leaf named by the subcommand words of `argv`, with its position.
    fn invoked_leaf(&self, argv: &[String]) -> Option<(&CliCommand, usize)> {
        let mut nodes = &self.nodes;
        let mut invoked = None;
        for (index, arg) in argv.iter().enumerate().skip(1) {
            if arg == "--" {
                break;
            }
            if arg.starts_with('-') {
                continue;
            }
            let Some(node) = nodes.iter().find(|node| node.answers_to(arg)) else {
                break;
            };
            invoked = node.leaf.as_ref().map(|leaf| (leaf, index));
            nodes = &node.children;
        }
        invoked
    }

    /// Runs the registry command selected by `matches`.
    ///
    /// Returns `None` when no subcommand was given or the subcommand is not
    /// part of the command tree, leaving built-ins to the caller.
    pub async fn dispatch(&self, matches: &ArgMatches, environment: &CliEnvironment) -> Option<i32> {
        let global_flags = global_flags(matches);
        let (name, mut current_matches) = matches.subcommand()?;
        let mut node = self.nodes.iter().find(|node| node.name == name)?;

        while let Some((name, sub_matches)) = current_matches.subcommand() {
            let Some(child) = node.child(name) else {
                break;
            };
            node = child;
            current_matches = sub_matches;
        }

        match &node.leaf {
            Some(leaf) => Some(leaf.run(current_matches, environment, global_flags).await),
            None => {
                environment.stderr.write_line(&format!("'{}' requires a subcommand", node.name));
                Some(EXIT_USAGE)
            }
        }
    }

    /// Parses `environment.argv` and runs the selected command.
    ///
    /// Without a subcommand the grouped command list is printed.
    pub async fn run(&self, environment: &CliEnvironment) -> i32 {
        let matches = match self.try_parse(&environment.argv) {
            Ok(matches) => matches,
            Err(error) => return report_parse_error(&error, environment),
        };
        if let Some(code) = self.dispatch(&matches, environment).await {
            return code;
        }
        let schemas: Vec<&CommandSchema> = self.leaves().into_iter().map(|leaf| leaf.command.metadata()).collect();
        environment.stdout.write_str(&generate_command_list(&schemas));
        0
    }

    fn leaves(&self) -> Vec<&CliCommand> {
        fn walk<'a>(nodes: &'a [CliNode], out: &mut Vec<&'a CliCommand>) {
            for node in nodes {
                if let Some(leaf) = &node.leaf {
                    out.push(leaf);
                }
                walk(&node.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}

fn global_flags(matches: &ArgMatches) -> IndexMap<String, Value> {
    GLOBAL_FLAGS
        .iter()
        .map(|flag| {
            let value = matches.try_get_one::<bool>(flag).ok().flatten().copied().unwrap_or(false);
            (flag.to_string(), Value::Bool(value))
        })
        .collect()
}

/// Prints a clap error and maps it to an exit code: help and version
/// requests succeed, everything else is a usage error.
pub fn report_parse_error(error: &clap::Error, environment: &CliEnvironment) -> i32 {
    let rendered = error.render().to_string();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            environment.stdout.write_str(&rendered);
            0
        }
        _ => {
            environment.stderr.write_str(&rendered);
            EXIT_USAGE
        }
    }
}
