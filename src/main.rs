use affectrig::{RigConfig, RigOrchestrator, SyntheticBackend};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "affectrig")]
#[command(about = "Physiological experiment rig - GSR logging with synchronized video capture")]
#[command(version)]
#[command(long_about = "Data collection rig for affect experiments. Reads galvanic skin \
response samples and gesture events from a handheld controller over a serial link, records \
synchronized video from the selected cameras, and writes per-session event and sensor logs \
under a timestamped experiment directory.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "affectrig.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Experiment identifier used in the data directory name
    #[arg(short, long, default_value = "session", help = "Experiment identifier")]
    experiment_id: String,

    /// Camera indices to record (defaults to all detected cameras)
    #[arg(long, value_delimiter = ',', help = "Comma-separated camera indices to record")]
    cameras: Vec<u32>,

    /// Disable the serial link and drive the rig from the keyboard only
    #[arg(long, help = "Run without the serial controller device")]
    no_serial: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the rig")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting affectrig v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let config = match RigConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    // Create and initialize the orchestrator
    let max_probe_index = config.recording.max_probe_index;
    let backend = Arc::new(SyntheticBackend::new((0..max_probe_index).collect()));
    let mut orchestrator = RigOrchestrator::new(config, backend).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    if args.no_serial {
        orchestrator.set_serial_enabled(false);
    }

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize rig: {}", e);
        e
    })?;

    // Handle dry run mode
    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    // Start all components
    orchestrator
        .start(&args.experiment_id, &args.cameras)
        .await
        .map_err(|e| {
            error!("Failed to start rig: {}", e);
            e
        })?;

    // Run the main event loop with signal handling
    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Rig error during execution: {}", e);
        e
    })?;

    info!("Rig exited with code: {}", exit_code);

    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("affectrig={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Affectrig Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&RigConfig::default())?);
    Ok(())
}
