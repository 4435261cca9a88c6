mod config;
mod table;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, LazyLock, Mutex};

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use console::style;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use kener_core::{
    ApiError, ApplyReport, ClientConfig, DefinitionError, HttpMonitorApi, Monitor, MonitorApi,
    Outcome, Reconciler, MONITOR_FIELDS,
};

use crate::config::{ConfigError, Instance, InstanceStore};
use crate::table::Table;

static VERSION: LazyLock<String> = LazyLock::new(|| {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_REV: &str = env!("KENER_AGENT_GIT_REV");

    if GIT_REV.is_empty() {
        VERSION.to_string()
    } else {
        format!("{VERSION} ({GIT_REV})")
    }
});

/// Apply YAML monitor definitions to a Kener status page.
#[derive(Parser)]
#[command(name = "kener-agent", version = VERSION.as_str(), about)]
struct Cli {
    /// Log level: trace, debug, info, warn, error or off. RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    /// Also append logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, default_value = "pretty", value_parser = ["pretty", "json"])]
    log_format: String,

    /// Agent config file. Defaults to <config dir>/kener-agent/config.yml.
    #[arg(long, global = true, env = "KENER_AGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save API connection settings for an instance.
    Login {
        /// Name of the instance (e.g. dev, prod).
        #[arg(long)]
        name: String,

        /// API host, e.g. 10.10.3.1 or https://status.example.com.
        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = config::default_port())]
        port: u16,

        /// Bearer token for API authentication.
        #[arg(long)]
        token: String,

        /// Folder containing the YAML definition files.
        #[arg(long)]
        folder: PathBuf,

        /// Make this the default instance.
        #[arg(long, default_value_t = false)]
        default: bool,
    },
    /// Create the monitors defined in the instance's folder.
    Apply {
        /// Instance to use instead of the default.
        #[arg(long)]
        instance: Option<String>,

        /// Definitions folder to use instead of the instance's.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Set the default instance.
    SetDefault {
        name: String,
    },
    /// List configured instances.
    List,
    /// Remove a configured instance.
    Remove {
        name: String,

        /// Instance to make default when removing the current default.
        #[arg(long)]
        new_default: Option<String>,
    },
    /// List the monitors that exist on an instance.
    ListMonitors {
        #[arg(long)]
        instance: Option<String>,

        /// Columns to display.
        #[arg(
            long,
            num_args = 1..,
            value_parser = PossibleValuesParser::new(MONITOR_FIELDS.iter().copied()),
            default_values = ["tag", "name", "category_name", "description", "type_data"]
        )]
        columns: Vec<String>,
    },
    /// Print the agent version.
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Apply { .. } => "apply",
            Self::SetDefault { .. } => "set-default",
            Self::List => "list",
            Self::Remove { .. } => "remove",
            Self::ListMonitors { .. } => "list-monitors",
            Self::Version => "version",
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Definitions(#[from] DefinitionError),
    #[error("failed to set up logging: {0}")]
    Logging(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level, &cli.log_format, cli.log_file.as_deref()) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        return ExitCode::FAILURE;
    }

    let command = cli.command.name();
    tracing::debug!(command, "Dispatching command");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(command, error = %e, "Command failed");
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let store = match cli.config {
        Some(path) => InstanceStore::new(path),
        None => InstanceStore::default_location()?,
    };

    match cli.command {
        Commands::Login {
            name,
            host,
            port,
            token,
            folder,
            default,
        } => {
            let instance = Instance {
                host,
                port,
                token,
                folder,
            };
            store.save_instance(&name, instance, default)?;
            println!(
                "Saved instance {} to {}",
                style(&name).bold(),
                style(store.path().display()).dim()
            );
        }
        Commands::Apply { instance, folder } => {
            let (name, instance) = store.load_instance(instance.as_deref())?;
            let folder = folder.unwrap_or_else(|| instance.folder.clone());
            tracing::info!(instance = %name, folder = %folder.display(), "Applying monitor definitions");

            let api = connect(&instance)?;
            let report = Reconciler::new(api).run(&folder).await?;
            print_report(&report, &folder);
        }
        Commands::SetDefault { name } => {
            store.set_default(&name)?;
            println!("Default instance set to {}", style(&name).bold());
        }
        Commands::List => {
            let config = store.list()?;
            if config.instances.is_empty() {
                println!("No instances configured.");
                return Ok(());
            }
            let mut table = Table::new(["Default", "Instance", "Host", "Port", "Folder"]);
            for (name, inst) in &config.instances {
                let marker = if config.default.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    ""
                };
                table.push_row(vec![
                    marker.to_string(),
                    name.clone(),
                    inst.host.clone(),
                    inst.port.to_string(),
                    inst.folder.display().to_string(),
                ]);
            }
            println!("{}", table.render());
        }
        Commands::Remove { name, new_default } => {
            store.remove(&name, new_default.as_deref())?;
            println!("Removed instance {}", style(&name).bold());
        }
        Commands::ListMonitors { instance, columns } => {
            let (name, instance) = store.load_instance(instance.as_deref())?;
            let api = connect(&instance)?;
            let monitors = api.list_monitors().await?;
            tracing::info!(instance = %name, count = monitors.len(), "Fetched monitors");

            if monitors.is_empty() {
                println!("No monitors found.");
                return Ok(());
            }
            println!("{}", monitor_table(&monitors, &columns).render());
        }
        Commands::Version => {
            println!("{}", VERSION.as_str());
        }
    }
    Ok(())
}

fn connect(instance: &Instance) -> Result<Arc<dyn MonitorApi>, CliError> {
    let config = ClientConfig::from_host_port(&instance.host, instance.port, instance.token.clone())?;
    Ok(Arc::new(HttpMonitorApi::new(&config)?))
}

fn monitor_table(monitors: &[Monitor], columns: &[String]) -> Table {
    let mut table = Table::new(columns.iter().cloned());
    for monitor in monitors {
        let payload = match monitor.to_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(tag = %monitor.tag, error = %e, "Cannot render monitor");
                continue;
            }
        };
        let row = columns
            .iter()
            .map(|c| match payload.get(c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        table.push_row(row);
    }
    table
}

fn print_report(report: &ApplyReport, folder: &Path) {
    if report.files.is_empty() {
        println!("No definition files found in {}", style(folder.display()).dim());
        return;
    }

    let mut table = Table::new(["File", "Tag", "Result"]);
    for m in &report.monitors {
        let file = m
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = match &m.outcome {
            Outcome::Created => style(m.outcome.to_string()).green().to_string(),
            Outcome::AlreadyExists | Outcome::Duplicate => style(m.outcome.to_string()).dim().to_string(),
            Outcome::Invalid(_) | Outcome::Failed(_) => style(m.outcome.to_string()).red().to_string(),
        };
        table.push_row(vec![file, m.tag.clone().unwrap_or_default(), result]);
    }
    if !table.is_empty() {
        println!("{}\n", table.render());
    }

    println!(
        "{} created, {} already existing, {} duplicate, {} invalid, {} failed",
        style(report.created()).green().bold(),
        report.already_existing(),
        report.duplicates(),
        style(report.invalid()).yellow(),
        style(report.failed()).red(),
    );
}

fn init_tracing(
    level: LevelFilter,
    log_format: &str,
    log_file: Option<&Path>,
) -> Result<(), CliError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match log_format {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer().with_writer(std::io::stderr).boxed(),
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CliError::Logging(format!("{}: {}", path.display(), e)))?;
        let writer = Mutex::new(file);
        layers.push(match log_format {
            "json" => fmt::layer().json().with_writer(writer).boxed(),
            _ => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}
