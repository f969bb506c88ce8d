// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! toolgraph main entry point - CLI and commands.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use toolgraph::config::{self, CliOptions, ResolvedConfig};
use toolgraph::manifest::{self, Manifest};
use toolgraph::telemetry::{init_telemetry, TelemetryConfig};
use toolgraph::types::{InvocationRecord, RecordOutcome};
use toolgraph::{
    InvocationCallbacks, InvocationEngine, InvocationError, InvocationState, ToolRegistry,
};

/// toolgraph version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// toolgraph - run declared tool graphs with a private coordination channel.
#[derive(Parser)]
#[command(name = "toolgraph")]
#[command(author, version, about = "Run declared tool graphs", long_about = None)]
struct Cli {
    /// Manifest file (default: toolgraph.yaml in the workspace root)
    #[arg(short, long, global = true, env = "TOOLGRAPH_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Root directory that file tools are confined to
    #[arg(long, global = true, env = "TOOLGRAPH_PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    /// Maximum dependency nesting
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Show verbose output (state changes of every tool)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Show trace-level logs
    #[arg(long, global = true)]
    trace_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Subcommands for toolgraph.
#[derive(Subcommand)]
enum Commands {
    /// Invoke a root tool and print its merged result
    Run {
        /// Tool to invoke
        root: String,

        /// Public input as JSON
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Print the invocation records and metrics
        #[arg(long)]
        trace: bool,
    },

    /// Check that every dependency exists and the graph has no cycle
    Validate,

    /// Show the call graph of a root tool
    Graph {
        /// Tool to start from
        root: String,
    },

    /// List the tools in the manifest
    List,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a configuration file and an example manifest
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

/// Prints state changes to stderr.
struct ProgressCallbacks;

impl InvocationCallbacks for ProgressCallbacks {
    fn on_state_change(&self, tool: &str, state: InvocationState) {
        let label = match state {
            InvocationState::Succeeded => state.to_string().green(),
            InvocationState::Failed => state.to_string().red(),
            _ => state.to_string().dimmed(),
        };
        eprintln!("{} {} {}", "→".cyan(), tool.bright_white(), label);
    }

    fn on_cache_hit(&self, tool: &str) {
        eprintln!("{} {} {}", "→".cyan(), tool.bright_white(), "cached".yellow());
    }

    fn on_channel_commit(&self, tool: &str, keys: usize) {
        if keys > 0 {
            eprintln!("{} {} committed {} private key(s)", "→".cyan(), tool.bright_white(), keys);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::from_flags(cli.verbose, cli.debug, cli.trace_logs);
    let _guard = init_telemetry(&telemetry)?;

    let cwd = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&cwd).unwrap_or(cwd);

    let cli_options = CliOptions {
        manifest: cli.manifest.clone(),
        project_root: cli.project_root.clone(),
        max_depth: cli.max_depth,
        ..Default::default()
    };

    match cli.command {
        Commands::Run {
            root,
            input,
            format,
            trace,
        } => {
            let config = config::load_config(&workspace_root, cli_options)?;
            let input: Value =
                serde_json::from_str(&input).context("--input must be valid JSON")?;
            handle_run(&config, &workspace_root, &root, input, format, trace, cli.verbose).await
        }
        Commands::Validate => {
            let config = config::load_config(&workspace_root, cli_options)?;
            let path = manifest_path(&config, &workspace_root)?;
            let manifest = Manifest::load(&path)?;
            match manifest.build_registry(&project_root(&config, &workspace_root)) {
                Ok(registry) => {
                    println!(
                        "{} {} ({} tools, no missing dependencies, no cycles)",
                        "✓".green(),
                        path.display(),
                        registry.len()
                    );
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{} {}", "✗".red(), e.to_string().red());
                    std::process::exit(1);
                }
            }
        }
        Commands::Graph { root } => {
            let config = config::load_config(&workspace_root, cli_options)?;
            let registry = load_registry(&config, &workspace_root)?;
            let graph = registry.call_graph(&root)?;
            print_tree(&registry, &root, "", true, &mut HashSet::new());
            println!(
                "\n{} {}",
                "Execution order:".dimmed(),
                graph.order().join(" → ")
            );
            Ok(())
        }
        Commands::List => {
            let config = config::load_config(&workspace_root, cli_options)?;
            let registry = load_registry(&config, &workspace_root)?;
            for def in registry.definitions() {
                let deps = if def.dependencies().is_empty() {
                    String::new()
                } else {
                    format!(" ← {}", def.dependencies().join(", "))
                };
                println!(
                    "{} [{}]{}",
                    def.name().bright_white().bold(),
                    def.merge_policy().name().cyan(),
                    deps
                );
                if !def.description().is_empty() {
                    println!("    {}", def.description().dimmed());
                }
            }
            Ok(())
        }
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let config = config::load_config(&workspace_root, cli_options)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Commands::Init => {
            let root = std::env::current_dir()?;
            let path = config::init_config(&root, None)?;
            println!("Created config file: {}", path.display());

            match manifest::find_manifest(&root) {
                Some(existing) => {
                    println!("Manifest already present: {}", existing.display());
                }
                None => {
                    let path = root.join(manifest::MANIFEST_FILES[0]);
                    std::fs::write(&path, serde_yaml::to_string(&manifest::example_manifest())?)?;
                    println!("Created manifest: {}", path.display());
                    println!(
                        "{}",
                        "Try: toolgraph run doc --input '{\"topic\": \"caching\", \"content\": \"Hello\"}'"
                            .dimmed()
                    );
                }
            }
            Ok(())
        }
        Commands::Version => {
            println!("toolgraph {}", VERSION);
            Ok(())
        }
    }
}

fn project_root(config: &ResolvedConfig, workspace_root: &Path) -> PathBuf {
    config
        .project_root
        .clone()
        .unwrap_or_else(|| workspace_root.to_path_buf())
}

fn manifest_path(config: &ResolvedConfig, workspace_root: &Path) -> anyhow::Result<PathBuf> {
    if let Some(path) = &config.manifest {
        return Ok(path.clone());
    }
    match manifest::find_manifest(workspace_root) {
        Some(path) => Ok(path),
        None => bail!(
            "No manifest found in {} (expected one of: {}). Run 'toolgraph init' to create one.",
            workspace_root.display(),
            manifest::MANIFEST_FILES.join(", ")
        ),
    }
}

fn load_registry(config: &ResolvedConfig, workspace_root: &Path) -> anyhow::Result<ToolRegistry> {
    let path = manifest_path(config, workspace_root)?;
    let manifest = Manifest::load(&path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))?;
    Ok(manifest.build_registry(&project_root(config, workspace_root))?)
}

fn print_tree(
    registry: &ToolRegistry,
    name: &str,
    prefix: &str,
    last: bool,
    seen: &mut HashSet<String>,
) {
    let branch = if prefix.is_empty() {
        ""
    } else if last {
        "└── "
    } else {
        "├── "
    };
    let shared = !seen.insert(name.to_string());
    if shared {
        println!("{prefix}{branch}{} {}", name, "(shared)".dimmed());
        return;
    }
    println!("{prefix}{branch}{}", name.bright_white());

    let Some(def) = registry.get(name) else {
        return;
    };
    let child_prefix = if prefix.is_empty() {
        "  ".to_string()
    } else if last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };
    let deps = def.dependencies();
    for (i, dep) in deps.iter().enumerate() {
        print_tree(registry, dep, &child_prefix, i + 1 == deps.len(), seen);
    }
}

async fn handle_run(
    config: &ResolvedConfig,
    workspace_root: &Path,
    root: &str,
    input: Value,
    format: OutputFormat,
    trace: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let registry = Arc::new(load_registry(config, workspace_root)?);

    let mut engine = InvocationEngine::new(registry).with_config(config.to_engine_config());
    if verbose {
        engine = engine.with_callbacks(Arc::new(ProgressCallbacks));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let session = engine.session();
    let result = session.invoke_with_cancel(root, input, cancel).await;

    match result {
        Ok(outcome) => {
            match format {
                OutputFormat::Text => {
                    match outcome.value.as_ref() {
                        Value::String(text) => println!("{text}"),
                        other => println!("{}", serde_json::to_string_pretty(other)?),
                    }
                    if trace {
                        print_records(&outcome.records, session.cache_hits());
                    }
                }
                OutputFormat::Json => {
                    let mut response = json!({
                        "success": true,
                        "sessionId": outcome.session_id,
                        "tool": outcome.tool,
                        "value": outcome.value,
                    });
                    if trace {
                        response["records"] = serde_json::to_value(&outcome.records)?;
                    }
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
            }
            print_metrics(trace);
            Ok(())
        }
        Err(e) => {
            report_failure(&e, format, &session.records(), trace)?;
            print_metrics(trace);
            std::process::exit(1);
        }
    }
}

fn report_failure(
    error: &InvocationError,
    format: OutputFormat,
    records: &[InvocationRecord],
    trace: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            eprintln!("{} {}", "✗".red(), error.to_string().red());
            eprintln!("  {} {}", "chain:".dimmed(), error.chain().join(" → "));
            if trace {
                print_records(records, 0);
            }
        }
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": error.to_string(),
                "chain": error.chain(),
            });
            if trace {
                response["records"] = serde_json::to_value(records)?;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn print_records(records: &[InvocationRecord], cache_hits: u64) {
    eprintln!("\n{}", "Invocations:".bright_blue().bold());
    for record in records {
        let marker = match &record.outcome {
            RecordOutcome::Succeeded { .. } => "✓".green(),
            RecordOutcome::Failed { .. } => "✗".red(),
        };
        eprintln!(
            "  {} {} ({:.2?})",
            marker,
            record.tool.bright_white(),
            record.duration
        );
        if let RecordOutcome::Failed { error, .. } = &record.outcome {
            eprintln!("      {}", error.dimmed());
        }
    }
    if cache_hits > 0 {
        eprintln!("  {} {} cache hit(s)", "•".yellow(), cache_hits);
    }
}

#[cfg(feature = "telemetry")]
fn print_metrics(trace: bool) {
    if trace {
        let report = toolgraph::telemetry::GLOBAL_METRICS.snapshot().format_report();
        eprintln!("\n{}", report.dimmed());
    }
}

#[cfg(not(feature = "telemetry"))]
fn print_metrics(_trace: bool) {}
