use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use brewline::{
    init_telemetry, render_dot, shutdown_telemetry, BrewlineConfig, ControllerHandle, ControllerState,
    InMemoryWorkflowEngine, ShutdownCoordinator, TemperatureMode, TransitionTable, Trigger,
};

#[derive(Parser)]
#[command(name = "brewline")]
#[command(about = "Coffee machine controller with a hierarchical state machine")]
#[command(long_about = "Brewline drives a simulated espresso machine: it preheats the boiler to the \
                       selected temperature mode and runs brews as cancellable workflows. Start with \
                       'brewline run' for a full cycle or 'brewline console' to fire triggers by hand.")]
struct Cli {
    /// Directory searched for brewline.toml and .brewline-rc
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the transition table as a Graphviz DOT document
    Graph {
        /// Highlight this state
        #[arg(long)]
        state: Option<String>,
    },
    /// Turn the machine on, wait for preheat, brew once and print the final snapshot
    Run {
        /// Temperature mode: Low, Middle or High
        #[arg(long)]
        mode: Option<String>,
        /// Cancel the brew after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
    /// Read commands from stdin: fire <trigger>, init <state>, mode <mode>, status, triggers, graph, quit
    Console,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            print_usage();
            Ok(())
        }
        Some(Commands::Graph { state }) => graph_command(state),
        Some(Commands::Run { mode, cancel_after_ms }) => tokio::runtime::Runtime::new()?
            .block_on(async { run_command(cli.config_dir, mode, cancel_after_ms).await }),
        Some(Commands::Console) => {
            tokio::runtime::Runtime::new()?.block_on(async { console_command(cli.config_dir).await })
        }
    }
}

fn print_usage() {
    println!("☕ brewline - coffee machine controller");
    println!();
    println!("   brewline run [--mode High]        full preheat and brew cycle");
    println!("   brewline console                  drive the controller from stdin");
    println!("   brewline graph [--state Idle]     Graphviz rendering of the state machine");
}

fn graph_command(state: Option<String>) -> Result<()> {
    let current = state.map(|s| s.parse::<ControllerState>()).transpose()?;
    print!("{}", render_dot(TransitionTable::controller(), current));
    Ok(())
}

struct Runtime {
    config: BrewlineConfig,
    controller: ControllerHandle,
    engine: Arc<InMemoryWorkflowEngine>,
}

impl Runtime {
    async fn start(config_dir: &std::path::Path) -> Result<Self> {
        BrewlineConfig::load_env_file()?;
        let config = BrewlineConfig::load_from(config_dir)?;
        init_telemetry(&config.observability)?;

        let engine = Arc::new(InMemoryWorkflowEngine::new(config.brewing.termination_grace()));
        let controller = ControllerHandle::spawn(&config, engine.clone()).await;
        Ok(Self {
            config,
            controller,
            engine,
        })
    }

    async fn stop(self) -> Result<()> {
        let result = ShutdownCoordinator::new(
            self.controller,
            self.engine,
            self.config.runtime.shutdown_timeout(),
        )
        .shutdown_all_services()
        .await;
        shutdown_telemetry();
        result.map(|_| ())
    }
}

async fn run_command(config_dir: PathBuf, mode: Option<String>, cancel_after_ms: Option<u64>) -> Result<()> {
    let runtime = Runtime::start(&config_dir).await?;
    let controller = runtime.controller.clone();

    let outcome = tokio::select! {
        outcome = brew_cycle(&controller, mode, cancel_after_ms) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    println!("{}", serde_json::to_string_pretty(&controller.metrics())?);

    runtime.stop().await?;
    outcome
}

async fn brew_cycle(controller: &ControllerHandle, mode: Option<String>, cancel_after_ms: Option<u64>) -> Result<()> {
    if let Some(mode) = mode {
        controller.set_mode(mode.parse::<TemperatureMode>()?).await?;
    }

    let transition = controller.fire(Trigger::TurnOn).await?;
    println!("🔌 {} -> {}", transition.source, transition.destination);

    let thermostat = Arc::clone(controller.thermostat());
    println!(
        "🔥 Preheating from {:.1}° to {:.1}°",
        thermostat.temperature(),
        thermostat.target()
    );
    let mut status = controller.subscribe();
    status
        .wait_for(|s| s.state == ControllerState::Idle && thermostat.is_at_target())
        .await?;
    println!("✅ Ready at {:.1}°", thermostat.temperature());

    controller.fire(Trigger::StartBrewing).await?;
    let handle = controller.status().running_workflow_handle;
    println!(
        "☕ Brewing ({})",
        handle.map(|h| h.to_string()).unwrap_or_default()
    );

    match cancel_after_ms {
        Some(ms) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            controller.fire(Trigger::CancelBrewing).await?;
            println!("🛑 Brew cancelled after {}ms", ms);
        }
        None => {
            status
                .wait_for(|s| s.state != ControllerState::Brewing)
                .await?;
            println!("✅ Brew complete");
        }
    }
    Ok(())
}

async fn console_command(config_dir: PathBuf) -> Result<()> {
    let runtime = Runtime::start(&config_dir).await?;
    let controller = runtime.controller.clone();
    info!("Console ready");
    println!("☕ brewline console - type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        match console_line(&controller, line.trim()).await {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => println!("❌ {}", e),
        }
    }

    runtime.stop().await
}

/// Returns false when the console should exit.
async fn console_line(controller: &ControllerHandle, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        ("", _) => {}
        ("quit" | "exit", _) => return Ok(false),
        ("fire", Some(trigger)) => {
            let transition = controller.fire(trigger.parse::<Trigger>()?).await?;
            println!(
                "✅ {}: {} -> {}",
                transition.trigger, transition.source, transition.destination
            );
        }
        ("init", Some(state)) => {
            controller.initialize(state.parse::<ControllerState>()?).await?;
            println!("✅ state set to {}", controller.state());
        }
        ("mode", Some(mode)) => {
            let mode = mode.parse::<TemperatureMode>()?;
            controller.set_mode(mode).await?;
            println!("✅ mode {} (target {:.1}°)", mode, mode.target_temperature());
        }
        ("status", _) => println!("{}", serde_json::to_string_pretty(&controller.snapshot())?),
        ("triggers", _) => {
            let triggers: Vec<_> = controller
                .permitted_triggers()
                .into_iter()
                .map(|t| t.to_string())
                .collect();
            println!("{}", triggers.join(", "));
        }
        ("graph", _) => print!("{}", controller.graph()),
        ("metrics", _) => println!("{}", serde_json::to_string_pretty(&controller.metrics())?),
        _ => {
            println!("Commands:");
            println!("   fire <trigger>   e.g. fire TurnOn");
            println!("   init <state>     force-set a leaf state");
            println!("   mode <mode>      Low, Middle or High");
            println!("   status | triggers | graph | metrics | quit");
        }
    }
    Ok(true)
}
