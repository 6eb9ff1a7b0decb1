//! Bid Bridge CLI for configuration checks and offline adapter runs.
//!
//! This tool provides commands for:
//! - Validating configuration files
//! - Listing the partners a configuration enables
//! - Running one partner's validation, request building, response
//!   interpretation and sync negotiation against local JSON fixtures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use bid_bridge_common::adapter::SyncOptions;

mod auction;
mod config;
mod error;

use auction::SyncConsent;
use error::CliError;

#[derive(Parser)]
#[command(name = "bbcli")]
#[command(about = "Bid Bridge CLI for config checks and offline adapter runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Selects the partner and the configuration it is loaded from.
#[derive(Args)]
struct PartnerArgs {
    /// Partner code (e.g. adhese, adtrue)
    #[arg(long, short)]
    partner: String,

    /// Path to the TOML configuration file (defaults to the embedded one)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List the partner codes a configuration enables
    Partners {
        /// Path to the TOML configuration file (defaults to the embedded one)
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Print the bid requests a partner accepts
    Validate {
        #[command(flatten)]
        target: PartnerArgs,

        /// JSON array of bid requests
        #[arg(long, short)]
        bids: PathBuf,
    },

    /// Print the wire requests a partner builds
    Build {
        #[command(flatten)]
        target: PartnerArgs,

        /// JSON array of bid requests
        #[arg(long, short)]
        bids: PathBuf,

        /// JSON auction context
        #[arg(long)]
        bidder_request: Option<PathBuf>,
    },

    /// Build requests, then interpret a raw partner response against the first
    Interpret {
        #[command(flatten)]
        target: PartnerArgs,

        /// JSON array of bid requests
        #[arg(long, short)]
        bids: PathBuf,

        /// JSON auction context
        #[arg(long)]
        bidder_request: Option<PathBuf>,

        /// Raw partner response body
        #[arg(long, short)]
        response: PathBuf,
    },

    /// Print the user-sync directives for a raw partner response
    Syncs {
        #[command(flatten)]
        target: PartnerArgs,

        /// Raw partner response body
        #[arg(long, short)]
        response: PathBuf,

        /// Bid requests the response answers
        #[arg(long, short)]
        bids: Option<PathBuf>,

        /// Allow iframe syncs
        #[arg(long)]
        iframe: bool,

        /// Allow image syncs
        #[arg(long)]
        pixel: bool,

        /// GDPR applies to this user
        #[arg(long)]
        gdpr_applies: bool,

        /// TCF consent string
        #[arg(long)]
        consent: Option<String>,

        /// US Privacy string (e.g. 1YNN)
        #[arg(long)]
        usp: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config against settings validation
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("Failed to initialize logger: {}", e);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Validate { file } => config::validate(&file, verbose),
        },
        Commands::Partners { file } => config::partners(file.as_deref(), verbose),
        Commands::Validate { target, bids } => {
            auction::validate(target.config.as_deref(), &target.partner, &bids, verbose)
        }
        Commands::Build {
            target,
            bids,
            bidder_request,
        } => auction::build(
            target.config.as_deref(),
            &target.partner,
            &bids,
            bidder_request.as_deref(),
            verbose,
        ),
        Commands::Interpret {
            target,
            bids,
            bidder_request,
            response,
        } => auction::interpret(
            target.config.as_deref(),
            &target.partner,
            &bids,
            bidder_request.as_deref(),
            &response,
            verbose,
        ),
        Commands::Syncs {
            target,
            response,
            bids,
            iframe,
            pixel,
            gdpr_applies,
            consent,
            usp,
        } => auction::syncs(
            target.config.as_deref(),
            &target.partner,
            &response,
            bids.as_deref(),
            SyncOptions {
                iframe_enabled: iframe,
                pixel_enabled: pixel,
            },
            &SyncConsent {
                gdpr_applies,
                consent,
                usp,
            },
            verbose,
        ),
    }
}
