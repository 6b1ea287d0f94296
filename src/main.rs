use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use change_metis::clients::{DisabledGenerator, NarrativeGenerator, generator_from_config};
use change_metis::config::Config;
use change_metis::{Assessment, StrategyOrchestrator, build_impact, http, init_tracing};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "change-metis", version, about = "Change management strategy service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override the bind address (otherwise CM_HTTP_BIND or 127.0.0.1:8787)
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Generate a strategy for an assessment JSON file and print it
    Assess {
        /// Path to the assessment JSON (`-` for stdin)
        input: PathBuf,
        /// Skip the narrative generator and use templates only
        #[arg(long)]
        offline: bool,
        /// Print only the stakeholder impact (no narrative at all)
        #[arg(long, conflicts_with = "offline")]
        impact_only: bool,
    },
}

fn read_assessment(path: &PathBuf) -> Result<Assessment> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("read assessment from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("read assessment {}", path.display()))?
    };
    serde_json::from_str(&raw).context("parse assessment JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    init_tracing(&config.runtime.log_level);

    match cli.command {
        Command::Serve { bind } => {
            if let Some(addr) = bind {
                config.runtime.http_bind = addr;
            }
            info!("Starting change-metis HTTP server");
            http::start_http_server(config).await?;
        }
        Command::Assess {
            input,
            offline,
            impact_only,
        } => {
            let assessment = read_assessment(&input)?;
            if impact_only {
                let impact = build_impact(&assessment.stakeholder_inputs());
                println!("{}", serde_json::to_string_pretty(&impact)?);
                return Ok(());
            }

            let generator: Arc<dyn NarrativeGenerator> = if offline {
                Arc::new(DisabledGenerator::new("--offline"))
            } else {
                generator_from_config(&config.generator)
            };
            let orchestrator = StrategyOrchestrator::new(
                generator,
                Duration::from_millis(config.generator.timeout_ms),
            );

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let result = orchestrator
                .generate_with_cancel(&assessment, &cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
