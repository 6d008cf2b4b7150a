use std::{collections::HashMap, path::PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use smg_grpc_bridge::{format, DynamicInvoker, ToolContext};
use smg_tool_registry::{ToolBridgeConfig, ToolRegistration, ToolRegistry};
use tracing::debug;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const CLI_REGISTRATION: &str = "default";

/// Expose the methods of a gRPC server as LLM tools.
#[derive(Parser, Debug)]
#[command(name = "smg-tool-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the tool groups of every source
    Discover(Source),

    /// Print tool definitions as JSON
    List {
        #[command(flatten)]
        source: Source,

        /// Only tools carrying this tag (repeatable, all must match)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only tools of this registration
        #[arg(long)]
        registration: Option<String>,
    },

    /// Print the input schema of one tool
    Schema {
        #[command(flatten)]
        source: Source,

        /// Tool name
        #[arg(long)]
        tool: String,

        /// Print the output schema instead
        #[arg(long)]
        output: bool,
    },

    /// Call one tool with a JSON request
    Call {
        #[command(flatten)]
        source: Source,

        /// Tool name
        #[arg(long)]
        tool: String,

        /// JSON request body
        #[arg(long, default_value = "{}")]
        input: String,

        /// JSON object sent as tool context metadata
        #[arg(long)]
        context: Option<String>,

        /// Print the response as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Save a registration's tool groups for offline use
    Save {
        #[command(flatten)]
        source: Source,

        /// Registration to save (defaults to the only one)
        #[arg(long)]
        registration: Option<String>,

        /// Snapshot file to write
        #[arg(long, short)]
        output: PathBuf,
    },
}

/// Where tools come from: a config file, or a single server.
#[derive(Args, Debug)]
struct Source {
    /// YAML registry configuration
    #[arg(long, env = "SMG_TOOL_CONFIG", conflicts_with = "target")]
    config: Option<PathBuf>,

    /// Server address, `host:port` or a URI
    #[arg(long, env = "SMG_TOOL_TARGET", required_unless_present = "config")]
    target: Option<String>,

    /// Channel option as `key=value` (repeatable)
    #[arg(long = "option", value_parser = parse_option, requires = "target")]
    options: Vec<(String, String)>,

    /// Restore tools from a snapshot instead of reflection
    #[arg(long, requires = "target")]
    snapshot: Option<PathBuf>,
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

impl Source {
    async fn registry(&self) -> anyhow::Result<ToolRegistry> {
        if let Some(path) = &self.config {
            let config = ToolBridgeConfig::from_file(path)
                .await
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            return Ok(ToolRegistry::from_config(&config).await?);
        }

        let target = self
            .target
            .as_deref()
            .context("either --config or --target is required")?;
        let options: HashMap<String, String> = self.options.iter().cloned().collect();
        let registration = ToolRegistration::new(CLI_REGISTRATION, target, options);
        match &self.snapshot {
            Some(path) => registration
                .reload_from_file(path)
                .await
                .with_context(|| format!("Failed to restore snapshot: {}", path.display()))?,
            None => registration.reload_by_auto_discovery().await?,
        }

        let registry = ToolRegistry::new();
        registry.register(registration)?;
        Ok(registry)
    }
}

fn find_tool(registry: &ToolRegistry, name: &str) -> anyhow::Result<DynamicInvoker> {
    registry
        .find_all()?
        .into_iter()
        .find(|invoker| invoker.name() == name)
        .with_context(|| format!("Tool not found: {name}"))
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!(command = ?cli.command, "Parsed command line");

    match cli.command {
        Command::Discover(source) => {
            let registry = source.registry().await?;
            for name in registry.names() {
                let Some(registration) = registry.get(&name) else {
                    continue;
                };
                println!("{name} ({})", registration.target());
                for group in registration.group_set().groups() {
                    println!("  {}", group.name());
                    for tool in group.tools() {
                        if tool.tags().is_empty() {
                            println!("    {}", tool.name());
                        } else {
                            println!("    {} [{}]", tool.name(), tool.tags().join(", "));
                        }
                    }
                }
            }
        }
        Command::List {
            source,
            tags,
            registration,
        } => {
            let registry = source.registry().await?;
            let definitions: Vec<_> = registry
                .find(registration.as_deref(), &tags)?
                .iter()
                .map(DynamicInvoker::definition)
                .collect();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Command::Schema {
            source,
            tool,
            output,
        } => {
            let registry = source.registry().await?;
            let invoker = find_tool(&registry, &tool)?;
            let schema = if output {
                invoker.output_schema()
            } else {
                invoker.input_schema()
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Call {
            source,
            tool,
            input,
            context,
            json,
        } => {
            let registry = source.registry().await?;
            let invoker = find_tool(&registry, &tool)?;
            let context = match context {
                Some(raw) => ToolContext::from_json(&raw)?,
                None => ToolContext::default(),
            };
            let response = invoker.call_with_context(&input, &context).await?;
            if json {
                println!("{}", format::to_json(&response)?);
            } else {
                println!("{}", format::format(&response));
            }
        }
        Command::Save {
            source,
            registration,
            output,
        } => {
            let registry = source.registry().await?;
            let name = match registration {
                Some(name) => name,
                None => match registry.names().as_slice() {
                    [only] => only.clone(),
                    [] => bail!("No registrations to save"),
                    _ => bail!("Several registrations configured, pick one with --registration"),
                },
            };
            let registration = registry
                .get(&name)
                .with_context(|| format!("Registration not found: {name}"))?;
            registration.save_to_file(&output).await?;
        }
    }
    Ok(())
}
