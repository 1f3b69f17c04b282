//! Market debate council CLI
//!
//! # Usage
//!
//! ```bash
//! export OPENROUTER_API_KEY="..."
//! export MISTRAL_API_KEY="..."
//!
//! # One-shot debate with a table summary
//! cargo run --bin council -- debate AAPL
//!
//! # Live progress events as JSON lines
//! cargo run --bin council -- debate NVDA --stream --context "FOMC minutes at 2pm ET"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use council_debate::{
    DebateConfig, DebateEvent, DebateService, DebateSession, ProviderSettings, TimedDebateStore,
    YahooMarketData,
};
use council_utils::{LogFormat, init_tracing_with};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(about = "Multi-agent LLM debate council for market moves", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults plus COUNCIL_* variables when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a debate for a symbol
    Debate {
        /// Ticker symbol, e.g. AAPL
        symbol: String,

        /// Economic calendar or news text shared with every agent
        #[arg(long)]
        context: Option<String>,

        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,

        /// Print the session as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show which provider each configured agent would use
    Roster,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with(cli.log_format);

    let config = match &cli.config {
        Some(path) => DebateConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => DebateConfig::from_env()?,
    };
    let settings = ProviderSettings::from_env()?;

    let service = DebateService::from_config(
        &config,
        &settings,
        Arc::new(YahooMarketData::new()),
        Arc::new(TimedDebateStore::new(config.cache_ttl())),
    )?;

    match cli.command {
        Command::Roster => print_roster(&service),
        Command::Debate {
            symbol,
            context,
            stream,
            json,
        } => {
            let symbol = symbol.trim().to_uppercase();
            info!("Starting debate for {}", symbol);

            if stream {
                let mut events = service.analyze_stream(&symbol, context).await?;
                while let Some(event) = events.next().await {
                    println!("{}", serde_json::to_string(&event)?);
                    if let DebateEvent::DebateComplete { data } = event {
                        if !json {
                            print_session(&data);
                        }
                    }
                }
            } else {
                let session = service.analyze(&symbol, context).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&session)?);
                } else {
                    print_session(&session);
                }
            }
        }
    }

    Ok(())
}

fn print_roster(service: &DebateService) {
    let Some(orchestrator) = service.orchestrator() else {
        println!("⚠️ LLM Council Unavailable: no agent has a configured provider");
        return;
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Agent", "Provider"]);
    for (agent, provider) in orchestrator.bindings() {
        table.add_row(vec![agent, provider]);
    }
    println!("{table}");
}

fn print_session(session: &DebateSession) {
    println!("{}", session.summary);
    if !session.is_complete() {
        return;
    }

    let market = &session.market_context;
    let source = if market.synthetic { " (synthetic)" } else { "" };
    println!(
        "{} ${:.2} {} {:.2}%{}\n",
        market.subject,
        market.price,
        market.direction,
        market.abs_move(),
        source
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Agent", "Confidence", "Thesis", "Supporting points"]);
    for output in &session.agent_outputs {
        let name = if output.is_fallback() {
            format!("{} (fallback)", output.agent_name())
        } else {
            output.agent_name().to_string()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(output.confidence()),
            Cell::new(output.thesis()),
            Cell::new(output.supporting_points().join("\n")),
        ]);
    }
    println!("{table}");

    for point in &session.disagreement_points {
        println!("\n⚖️ {}", point.topic);
        for view in &point.viewpoints {
            match view.strength {
                Some(strength) => println!("  {} [{:?}]: {}", view.label, strength, view.position),
                None => println!("  {}: {}", view.label, view.position),
            }
        }
    }
}
