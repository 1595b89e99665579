mod config;
mod get;
mod list;
mod mandatory;
mod providers;
mod repos;
mod versions;

use config::BndConfig;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bndx")]
#[command(about = "Inspect bnd repositories and resolve candidates")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory to start the bnd.toml search from
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured repositories
    Repos(repos::ReposArgs),

    /// List symbolic names across repositories
    List(list::ListArgs),

    /// Show the versions of a symbolic name in every repository
    Versions(versions::VersionsArgs),

    /// Fetch an artifact and print its local path
    Get(get::GetArgs),

    /// Find the ranked providers for a requirement
    Providers(providers::ProvidersArgs),

    /// Show the resources taking part in every resolve
    Mandatory(mandatory::MandatoryArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    let start_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine the working directory")?,
    };
    let config = BndConfig::load_or_default(&start_dir)?;
    log::debug!("Workspace root is {}", config.base_dir().display());

    match args.command {
        Commands::Repos(args) => repos::execute(args, &config),
        Commands::List(args) => list::execute(args, &config),
        Commands::Versions(args) => versions::execute(args, &config),
        Commands::Get(args) => get::execute(args, &config),
        Commands::Providers(args) => providers::execute(args, &config),
        Commands::Mandatory(args) => mandatory::execute(args, &config),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
