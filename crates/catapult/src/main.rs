// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Catapult - declarative smart-contract deployment orchestrator.
//!
//! Loads a YAML project (jobs, templates, artifacts, networks), plans jobs in
//! dependency order, and executes them per network, streaming typed events to
//! the terminal.

use clap::{Parser, Subcommand};
use eyre::Result;
use std::{path::PathBuf, process::ExitCode, sync::Arc};

use catapult_common::{Event, EventEmitter, EventKind};
use catapult_engine::{
    load_project, plan, AlloyConnector, CancelToken, Runner, RunnerConfig,
};
use serde_json::json;

mod config;
mod render;
mod utils;

/// Exit code for a cancelled run, distinct from failure.
const EXIT_CANCELLED: u8 = 130;

/// Command-line interface for Catapult
#[derive(Debug, Parser)]
#[command(name = "catapult")]
#[command(about = "Declarative smart-contract deployment orchestrator for EVM networks")]
#[command(version)]
pub struct Cli {
    /// Project root directory (holds networks.yaml, jobs/, templates/)
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Verbosity of the event renderer (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute the project's jobs on the target networks
    Run {
        /// Networks to deploy to (defaults to every declared network)
        #[arg(long = "network")]
        networks: Vec<String>,

        /// Deployer private key (falls back to CATAPULT_PRIVATE_KEY)
        #[arg(long, env = catapult_common::env::CATAPULT_PRIVATE_KEY, hide_env_values = true)]
        private_key: Option<String>,

        /// Run networks concurrently instead of one after another
        #[arg(long)]
        parallel: bool,
    },
    /// Print the planned job order without executing anything
    Plan,
    /// Load and validate the project, then exit
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    if let Err(error) = catapult_common::logging::init_logging("catapult", true) {
        eprintln!("failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let emitter = Arc::new(EventEmitter::new());
    render::attach_renderer(&emitter, cli.verbose);

    match run_command(&cli, &emitter).await {
        Ok(code) => code,
        Err(error) => {
            emitter.emit(Event::new(
                EventKind::CliError,
                json!({"error": format!("{error:#}")}),
            ));
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: &Cli, emitter: &Arc<EventEmitter>) -> Result<ExitCode> {
    let project = load_project(&cli.project, emitter)?;

    match &cli.command {
        Commands::Validate => {
            plan(&project.jobs)?;
            println!(
                "project ok: {} job(s), {} template(s), {} artifact(s), {} network(s)",
                project.jobs.len(),
                project.templates.len(),
                project.repository.len(),
                project.networks.len(),
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan => {
            let order = plan(&project.jobs)?;
            println!("execution order:");
            for (position, &index) in order.iter().enumerate() {
                let job = &project.jobs[index];
                if job.depends_on.is_empty() {
                    println!("  {}. {}", position + 1, job.name);
                } else {
                    println!("  {}. {} (after {})", position + 1, job.name, job.depends_on.join(", "));
                }
            }
            println!("networks: {}", project.networks.iter().map(|n| n.name.as_str()).collect::<Vec<_>>().join(", "));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { networks, private_key, parallel } => {
            let app_config = config::load_config(&cli.project)?;
            let registry = config::build_registry(&app_config)?;
            let load_errors: Vec<String> = registry
                .plugins()
                .iter()
                .filter_map(|p| {
                    p.load_error.as_ref().map(|e| format!("plugin \"{}\": {e}", p.name))
                })
                .collect();
            if !load_errors.is_empty() {
                emitter.emit(Event::new(EventKind::Warnings, json!({"warnings": load_errors})));
            }

            let private_key = utils::resolve_private_key(private_key.clone())?;

            let cancel = CancelToken::new();
            let cancel_on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, cancelling run");
                    cancel_on_interrupt.cancel();
                }
            });

            let runner = Runner::new(
                Arc::new(project),
                Arc::new(registry),
                Arc::clone(emitter),
                Arc::new(AlloyConnector::default()),
                RunnerConfig { private_key, parallel_networks: *parallel },
            );
            let outcome = runner.run(networks, cancel).await?;

            utils::write_outputs(&cli.project, &outcome);

            if outcome.cancelled {
                Ok(ExitCode::from(EXIT_CANCELLED))
            } else if outcome.success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
