use clap::Parser;
use tickfeed::cli::{Cli, Commands};
use tickfeed::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _guard = tickfeed::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting market-data engine");
            args.execute(config).await?;
        }
        Commands::Seed(args) => {
            tracing::info!("Seeding instrument store");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Tick: every {} ms, max move {} bps, floor {}",
                config.tick.interval_ms, config.tick.max_delta_bps, config.tick.min_price
            );
            println!(
                "  Persistence: flush every {} s (timeout {} s), dir {}",
                config.persistence.flush_interval_secs,
                config.persistence.flush_timeout_secs,
                config.persistence.data_dir.display()
            );
            println!(
                "  Bootstrap: reload every {} s",
                config.bootstrap.reload_interval_secs
            );
            println!(
                "  Telemetry: level {}, metrics port {:?}",
                config.telemetry.log_level, config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}
