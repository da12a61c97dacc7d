use anyhow::{Context, Result};
use arb_config::{defaults, load_config, EngineConfig, LoggingSettings};
use clap::{Parser, Subcommand};
use flash_arbitrage::config::{build_engine, load_registry};
use flash_arbitrage::{demo, log_pool, log_success};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flash_arbitrage", about = "Atomic multi-protocol flash arbitrage engine")]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON logs regardless of the configured format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the DEX registry
    Registry,
    /// Load and validate a configuration file
    CheckConfig { path: PathBuf },
    /// Run a V2→V3 flash arbitrage against an in-memory market
    Demo {
        /// Price gap pushed onto the V2 pair, in basis points
        #[arg(long, default_value_t = 150)]
        gap_bps: u32,
    },
}

fn init_logging(settings: &LoggingSettings, force_json: bool) {
    let filter = EnvFilter::try_from_env(defaults::logging::FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.json || force_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn demo_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.address = arb_types::Address::from_low_u64_be(0xe0);
    config.engine.owner = arb_types::Address::from_low_u64_be(0xa0);
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Some(load_config(&path.to_string_lossy())?),
        None => None,
    };
    let logging = config.as_ref().map(|c| c.logging.clone()).unwrap_or_default();
    init_logging(&logging, cli.json);

    match cli.command {
        Command::Registry => {
            let config = config.unwrap_or_else(demo_config);
            let registry = load_registry(&config)?;
            for entry in registry.entries() {
                println!("{:>3}  {:<45} {:<24} {}", entry.id, entry.key, entry.name, entry.protocol);
            }
            log_pool!("{} protocols registered", registry.len());
        }
        Command::CheckConfig { path } => {
            let config = load_config(&path.to_string_lossy())
                .with_context(|| format!("Invalid configuration {:?}", path))?;
            let registry = load_registry(&config)?;
            let engine = build_engine(&config, &registry);
            info!(
                owner = ?engine.owner(),
                lenders = engine.lenders().len(),
                relay = ?engine.relay(),
                "Engine configured"
            );
            log_success!("{:?} is valid", path);
        }
        Command::Demo { gap_bps } => {
            let config = config.unwrap_or_else(demo_config);
            let registry = load_registry(&config)?;
            let outcome = demo::run(&config, &registry, gap_bps)?;

            println!("amount in:     {}", outcome.amount_in);
            for hop in &outcome.report.hops {
                println!(
                    "hop {}:         {} → {} via {:?}",
                    hop.index, hop.amount_in, hop.amount_out, hop.pool
                );
            }
            if let Some(profit) = outcome.report.profit {
                println!("gross out:     {}", profit.gross_out);
                println!("owed:          {}", profit.principal_plus_fee);
                println!("net:           {}", profit.net);
            }
            println!("owner balance: {}", outcome.owner_balance);
            println!(
                "phases:        {}",
                outcome
                    .report
                    .phases
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" → ")
            );
        }
    }
    Ok(())
}
