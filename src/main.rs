use anyhow::Result;
use authscan::{AuthscanConfig, AuthscanOrchestrator, LaunchOptions};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "authscan")]
#[command(about = "Scan a product QR code and verify it against the authentication service")]
#[command(version)]
#[command(long_about = "Negotiates the rear camera, scans for a QR symbol with adaptive zoom, \
submits the captured frame for authentication and prints the verdict. \
Exits 0 for genuine, 2 for counterfeit, 3 for indeterminate and 1 on error.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "authscan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Serve a picture file as the camera
    #[arg(long, value_name = "PATH", help = "Use a still image instead of a camera device")]
    image: Option<PathBuf>,

    /// Prefer the camera whose label contains this text
    #[arg(long, value_name = "LABEL", help = "Camera label to prefer over automatic selection")]
    device_label: Option<String>,

    /// Batch number reported with the outcome
    #[arg(long, value_name = "BATCH", help = "Product batch number carried in telemetry")]
    batch: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for rolling log files")]
    log_dir: Option<PathBuf>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting authscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match AuthscanConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            drop(log_guard);
            std::process::exit(1);
        }
    }

    let options = LaunchOptions {
        image: args.image.clone(),
        device_label: args.device_label.clone(),
        batch: args.batch.clone(),
    };

    let mut orchestrator = AuthscanOrchestrator::new(config, options).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    let exit_code = match orchestrator.run().await {
        Ok(report) => {
            println!("{}", report.page);
            report.exit_code()
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            eprintln!("✗ {}", e);
            1
        }
    };

    info!("authscan exited with code: {}", exit_code);

    // Flush file logs before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
    };

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
        .unwrap_or_else(|_| EnvFilter::new(format!("authscan={}", log_level)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    // Logs go to stderr; stdout carries the result page
    let stderr_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };
    layers.push(stderr_layer);

    let guard = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "authscan.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Authscan Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every key can be overridden with AUTHSCAN_<SECTION>__<KEY> environment variables");
    println!();
    println!("{}", toml::to_string_pretty(&AuthscanConfig::default())?);
    Ok(())
}
