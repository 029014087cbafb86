//! CalcClient - CalcProtocol negotiation client
//!
//! Connects to a CalcProtocol server, solves the assignment it hands out and
//! reports whether the server accepted the answer.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use calc_client::config::{self, Config};
use calc_client::network::{negotiate, NetChannelFactory, Negotiation, Outcome, TransportMode};
use calc_client::Target;

/// CalcClient - CalcProtocol negotiation client
#[derive(Parser)]
#[command(name = "calc-client")]
#[command(author = "CalcClient Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Solve a CalcProtocol assignment over TCP or UDP", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate one assignment with a server
    Run {
        /// Target in the form PROTOCOL://server:port/api (PROTOCOL: tcp, udp, any; api: text, binary)
        url: String,

        /// Print a JSON summary instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    host: &'a str,
    port: u16,
    #[serde(flatten)]
    negotiation: &'a Negotiation,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { url, json } => run_client(&config, &url, json).await,
        Commands::Config { generate, output } => {
            let contents = if generate {
                config::generate_sample_config()?
            } else {
                toml::to_string_pretty(&config)?
            };
            if let Some(path) = output {
                std::fs::write(&path, &contents)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", contents);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Negotiate with the server named by `url`
async fn run_client(config: &Config, url: &str, json: bool) -> anyhow::Result<ExitCode> {
    let target: Target = match url.parse() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("ERROR: Invalid URL format: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    tracing::info!(
        "Negotiating with {}:{} (mode {}, {})",
        target.host,
        target.port,
        target.mode,
        target.encoding
    );

    let factory = NetChannelFactory::new(target.host.clone(), target.port)
        .with_connect_timeout(config.network.connect_timeout());
    let session_config = config.network.session_config(target.encoding);

    if !json {
        println!("{}", target);
    }

    let negotiation = negotiate(target.mode, &factory, &session_config).await;

    if json {
        let summary = Summary {
            host: &target.host,
            port: target.port,
            negotiation: &negotiation,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_negotiation(&target, &negotiation);
    }

    Ok(if negotiation.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Print each attempt the way a user expects to read it
fn print_negotiation(target: &Target, negotiation: &Negotiation) {
    for report in &negotiation.attempts {
        if let Some(assignment) = &report.assignment {
            println!("ASSIGNMENT: {}", assignment);
        }

        match (&report.outcome, report.result) {
            (Outcome::Accepted { result }, _) => println!("OK (myresult={})", result),
            (Outcome::Rejected { .. }, Some(result)) => println!("ERROR (myresult={})", result),
            (Outcome::Rejected { reason }, None) => eprintln!("ERROR: {}", reason),
            (Outcome::Failed { reason, .. }, _) => eprintln!("ERROR: {}", reason),
        }
    }

    if negotiation.mode == TransportMode::Any {
        match negotiation.transport {
            Some(transport) => println!("Successfully connected using {}", transport),
            None => eprintln!("ERROR: CANT CONNECT TO {}", target.host),
        }
    }
}
