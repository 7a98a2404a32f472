//! lmkernel CLI
//!
//! Assembles the kernel registry, session relay and protocol adapter, then
//! runs cells from the command line or stdin as a console host.

mod console;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use lmkernel_core::config::{self, Config};
use lmkernel_core::tracing_init::{default_filter, init_tracing};
use lmkernel_core::StreamConvention;
use lmkernel_kernel::{
    ChannelSink, IoPubMessage, KernelHandlers, KernelRegistry, KernelSpec, ProtocolAdapter,
};
use lmkernel_relay::ollama::OllamaCapability;
use lmkernel_relay::{ProgressObserver, SessionRelay};

type ConsoleKernel = ProtocolAdapter<OllamaCapability, ChannelSink>;

#[derive(Parser, Debug)]
#[command(name = "lmkernel")]
#[command(version, about = "Notebook kernel backed by an on-device language model")]
struct Cli {
    /// JSON config file layered over the global settings
    #[arg(long, env = "LMKERNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the local model server (e.g. "http://127.0.0.1:11434")
    #[arg(long)]
    base_url: Option<String>,

    /// Model to prompt
    #[arg(long)]
    model: Option<String>,

    /// Fail instead of downloading a missing model
    #[arg(long)]
    no_pull: bool,

    /// How streamed increments are interpreted: auto, cumulative, incremental
    #[arg(long)]
    convention: Option<StreamConvention>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run each prompt as a cell; reads one prompt per stdin line when none given
    Exec { prompts: Vec<String> },
    /// Print the kernel spec as JSON
    Spec,
    /// Print the kernel info reply as JSON
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    init_tracing(
        &default_filter(&config.log.level),
        cli.log_json || config.log.json,
    );
    info!(version = env!("CARGO_PKG_VERSION"), "Starting lmkernel");

    let registry = build_registry(&config)?;
    let name = config.kernel.name.as_str();

    let mut stdout = io::stdout().lock();
    match cli.command {
        Command::Spec => {
            let spec = registry
                .spec(name)
                .with_context(|| format!("Kernel {name} is not registered"))?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(spec)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Info => {
            let (kernel, _iopub) = registry.start(name)?;
            let info = kernel.kernel_info_request().await;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&info)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Exec { prompts } => {
            let prompts = if prompts.is_empty() {
                read_stdin_prompts().await?
            } else {
                prompts
            };
            let (kernel, mut iopub) = registry.start(name)?;
            let mut stderr = io::stderr().lock();
            let failures =
                console::run_cells(&kernel, &mut iopub, &prompts, &mut stdout, &mut stderr)
                    .await?;
            info!(cells = prompts.len(), failures, "Finished");
            Ok(if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.base_url {
        config.model.base_url.clone_from(url);
    }
    if let Some(model) = &cli.model {
        config.model.model.clone_from(model);
    }
    if cli.no_pull {
        config.model.pull_if_missing = false;
    }
    if let Some(convention) = cli.convention {
        config.model.convention = convention;
    }
}

/// Register the console kernel explicitly; each start gets its own relay and
/// IOPub channel.
#[allow(clippy::print_stderr)]
fn build_registry(
    config: &Config,
) -> anyhow::Result<KernelRegistry<(ConsoleKernel, UnboundedReceiver<IoPubMessage>)>> {
    let capability = OllamaCapability::new(&config.model)
        .context("Failed to initialise model client")?;
    info!(model = capability.model(), base_url = %config.model.base_url, "Model backend configured");
    let spec = KernelSpec::from_config(&config.kernel);
    let info = spec.kernel_info();
    let convention = config.model.convention;

    let mut registry = KernelRegistry::new();
    registry.register(spec, move || {
        let (sink, rx) = ChannelSink::new();
        let relay = SessionRelay::new(capability.clone())
            .with_convention(convention)
            .with_progress_observer(ProgressObserver::new(|event| {
                eprintln!(
                    "[Downloading model: {:.0}%{}]",
                    event.fraction * 100.0,
                    event.text.map(|t| format!(" {t}")).unwrap_or_default()
                );
            }));
        (ProtocolAdapter::new(relay, sink, info.clone()), rx)
    })?;
    Ok(registry)
}

async fn read_stdin_prompts() -> anyhow::Result<Vec<String>> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut prompts = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            prompts.push(line);
        }
    }
    Ok(prompts)
}
