use std::{fs, process::ExitCode, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use omnicmd_api::{ApiServer, registry_router};
use omnicmd_engine::HandlerLoader;
use omnicmd_mcp::{McpHttpServer, OmnicmdMcpCore, serve_stdio};
use omnicmd_registry::{CliApp, CliEnvironment, CommandRegistry, report_parse_error};
use omnicmd_util::{generate_command_list, generate_markdown};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let environment = CliEnvironment::from_process();
    init_tracing(environment.argv.iter().any(|arg| arg == "--verbose"));

    match run(&environment).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(error) => {
            environment.stderr.write_line(&format!("Error: {error:#}"));
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so stdout stays clean for command output and the MCP
/// stdio transport.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(environment: &CliEnvironment) -> Result<i32> {
    let config = config::load_config()?;
    let registry = build_registry(&config)?;
    let app = CliApp::from_registry("omnicmd", &registry)
        .about("Run commands from the terminal, over HTTP, or as agent tools")
        .version(env!("CARGO_PKG_VERSION"))
        .with_subcommand(serve_command())
        .with_subcommand(mcp_command())
        .with_subcommand(docs_command())
        .with_subcommand(ClapCommand::new("commands").about("List available commands"));

    let matches = match app.try_parse(&environment.argv) {
        Ok(matches) => matches,
        Err(error) => return Ok(report_parse_error(&error, environment)),
    };
    if let Some(code) = app.dispatch(&matches, environment).await {
        return Ok(code);
    }

    match matches.subcommand() {
        Some(("serve", sub)) => run_api_server(&registry, &config, sub).await,
        Some(("mcp", sub)) => run_mcp_server(&registry, &config, sub).await,
        Some(("docs", sub)) => write_docs(&registry, sub, environment),
        Some(("commands", _)) | None => {
            environment.stdout.write_str(&generate_command_list(&registry.schemas()));
            Ok(0)
        }
        Some((other, _)) => bail!("unhandled subcommand '{other}'"),
    }
}

fn build_registry(config: &AppConfig) -> Result<CommandRegistry> {
    let mut registry = CommandRegistry::new();
    let loader: Arc<dyn HandlerLoader> = Arc::new(commands::handler_table());
    commands::register_builtin(&mut registry, Arc::clone(&loader)).context("register bundled commands")?;

    for path in config.manifest_paths() {
        let count = registry
            .load_manifest(&path, Arc::clone(&loader))
            .with_context(|| format!("load manifest {}", path.display()))?;
        debug!(path = %path.display(), count, "loaded command manifest");
    }
    Ok(registry)
}

fn serve_command() -> ClapCommand {
    ClapCommand::new("serve")
        .about("Serve every command as an HTTP route")
        .arg(
            Arg::new("bind")
                .long("bind")
                .action(ArgAction::Set)
                .help("Address to listen on, e.g. 127.0.0.1:3000"),
        )
        .arg(
            Arg::new("base-path")
                .long("base-path")
                .action(ArgAction::Set)
                .help("Prefix for all routes, e.g. /api"),
        )
}

fn mcp_command() -> ClapCommand {
    ClapCommand::new("mcp")
        .about("Serve every command as an MCP tool (stdio unless --http)")
        .arg(
            Arg::new("http")
                .long("http")
                .action(ArgAction::SetTrue)
                .help("Use streamable HTTP on a loopback address"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .action(ArgAction::Set)
                .requires("http")
                .help("Loopback address for --http"),
        )
}

fn docs_command() -> ClapCommand {
    ClapCommand::new("docs").about("Print Markdown documentation").arg(
        Arg::new("output")
            .long("output")
            .short('o')
            .action(ArgAction::Set)
            .help("Write to a file instead of stdout"),
    )
}

async fn run_api_server(registry: &CommandRegistry, config: &AppConfig, matches: &ArgMatches) -> Result<i32> {
    let bind = matches
        .get_one::<String>("bind")
        .map(String::as_str)
        .or(config.http.bind_address.as_deref());
    let base_path = matches
        .get_one::<String>("base-path")
        .map(String::as_str)
        .unwrap_or(&config.http.base_path);

    let bind_address = omnicmd_api::resolve_bind_address(bind)?;
    let running = ApiServer::new(bind_address, registry_router(registry, base_path))
        .start()
        .await?;
    println!("Serving {} routes on http://{}", registry.len(), running.bound_address());

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("shutting down API server");
    running.stop().await?;
    Ok(0)
}

async fn run_mcp_server(registry: &CommandRegistry, config: &AppConfig, matches: &ArgMatches) -> Result<i32> {
    let core = OmnicmdMcpCore::new(registry).with_instructions("Each tool runs one omnicmd command.");
    if !matches.get_flag("http") {
        serve_stdio(core).await?;
        return Ok(0);
    }

    let bind = matches
        .get_one::<String>("bind")
        .map(String::as_str)
        .or(config.mcp.bind_address.as_deref());
    let bind_address = omnicmd_mcp::resolve_bind_address(bind)?;
    let running = McpHttpServer::new(bind_address, core).start().await?;
    eprintln!("MCP server listening on http://{}/mcp", running.bound_address());

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!(clients = running.connected_clients(), "shutting down MCP server");
    running.stop().await?;
    Ok(0)
}

fn write_docs(registry: &CommandRegistry, matches: &ArgMatches, environment: &CliEnvironment) -> Result<i32> {
    let markdown = registry
        .schemas()
        .into_iter()
        .map(generate_markdown)
        .collect::<Vec<_>>()
        .join("\n");
    match matches.get_one::<String>("output") {
        Some(path) => {
            let path = omnicmd_util::expand_tilde(path);
            fs::write(&path, markdown).with_context(|| format!("write {}", path.display()))?;
        }
        None => environment.stdout.write_str(&markdown),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(registry: &CommandRegistry) -> CliApp {
        CliApp::from_registry("omnicmd", registry)
            .with_subcommand(serve_command())
            .with_subcommand(mcp_command())
            .with_subcommand(docs_command())
    }

    async fn invoke(argv: &[&str]) -> (i32, String, String) {
        let registry = build_registry(&AppConfig::default()).expect("registry");
        let environment = CliEnvironment::captured(argv.iter().copied());
        let code = app(&registry).run(&environment).await;
        (code, environment.stdout.contents(), environment.stderr.contents())
    }

    #[tokio::test]
    async fn greet_runs_through_the_cli() {
        let (code, stdout, _) = invoke(&["omnicmd", "greet", "Ada", "--shout"]).await;
        assert_eq!(code, 0);
        assert_eq!(stdout.trim(), "HELLO, ADA!");
    }

    #[tokio::test]
    async fn command_aliases_resolve() {
        let (code, stdout, _) = invoke(&["omnicmd", "hello", "Ada", "-g", "Hi"]).await;
        assert_eq!(code, 0);
        assert_eq!(stdout.trim(), "Hi, Ada!");
    }

    #[tokio::test]
    async fn variadic_numbers_sum() {
        let (code, stdout, _) = invoke(&["omnicmd", "math", "sum", "1", "2", "3.5"]).await;
        assert_eq!(code, 0);
        assert_eq!(stdout.trim(), "= 6.5");
    }

    #[tokio::test]
    async fn echo_receives_pass_through_arguments() {
        let (code, stdout, _) = invoke(&["omnicmd", "text", "echo", "a", "b", "--", "--raw"]).await;
        assert_eq!(code, 0);
        assert_eq!(stdout.trim(), "a b --raw");
    }

    #[tokio::test]
    async fn missing_required_positional_is_a_usage_error() {
        let (code, _, stderr) = invoke(&["omnicmd", "text", "reverse"]).await;
        assert_eq!(code, 64);
        assert!(!stderr.is_empty());
    }

    #[tokio::test]
    async fn not_found_maps_to_exit_66() {
        let (code, _, stderr) = invoke(&["omnicmd", "users", "get", "500"]).await;
        assert_eq!(code, 66);
        assert!(stderr.contains("user 500 not found"));
    }

    #[test]
    fn manifests_from_config_extend_the_registry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let manifest = dir.path().join("commands.yaml");
        fs::write(
            &manifest,
            "commands:\n  - name: shout\n    description: Echo loudly\n    handler: text#echo\n    parameters:\n      - name: words\n        type: array\n        positional: true\n        variadic: true\n",
        )
        .expect("write manifest");
        let config = AppConfig {
            manifests: vec![manifest.display().to_string()],
            ..Default::default()
        };
        let registry = build_registry(&config).expect("registry");
        assert!(registry.get("shout").is_some_and(|command| command.is_lazy()));
    }

    #[test]
    fn missing_manifests_are_reported() {
        let config = AppConfig {
            manifests: vec!["/definitely/not/here.json".to_string()],
            ..Default::default()
        };
        let error = build_registry(&config).unwrap_err();
        assert!(format!("{error:#}").contains("/definitely/not/here.json"));
    }

    #[test]
    fn docs_cover_every_command() {
        let registry = build_registry(&AppConfig::default()).expect("registry");
        let environment = CliEnvironment::captured(["omnicmd", "docs"]);
        let matches = app(&registry).try_parse(&environment.argv).expect("parse");
        let (_, sub) = matches.subcommand().expect("docs");
        assert_eq!(write_docs(&registry, sub, &environment).expect("docs"), 0);
        let markdown = environment.stdout.contents();
        for schema in registry.schemas() {
            assert!(markdown.contains(&schema.name), "missing {}", schema.name);
        }
    }
}
