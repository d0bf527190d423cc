use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docket_cli::cli::{
    run_clear, run_ledger, run_poll, run_signal, run_sources, run_watch, CliConfig,
};
use docket_cli::tracing_setup::init_tracing;
use docket_core::{CoreConfig, NotificationCategory};

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Unread notification counts for the records portal")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Profile directory holding the ledger (overrides config and DOCKET_PROFILE_DIR)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Role to poll as (overrides config)
    #[arg(long, global = true)]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and print counts as they change
    Watch,

    /// Run one poll cycle and print the counts
    Poll,

    /// Mark every item in a category read
    Clear {
        /// Category name, e.g. new-requests
        category: NotificationCategory,
    },

    /// Tell other processes on this profile to refresh
    Signal,

    /// Show per-category ledger totals
    Ledger,

    /// Show the queries a role would issue
    Sources {
        /// Role to inspect (defaults to the configured role)
        #[arg(long = "for")]
        for_role: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Watch => block_on(run_watch(config, cli.pretty)),
        Commands::Poll => block_on(run_poll(config, cli.pretty)),
        Commands::Clear { category } => run_clear(&config, category, cli.pretty),
        Commands::Signal => run_signal(&config, cli.pretty),
        Commands::Ledger => run_ledger(&config, cli.pretty),
        Commands::Sources { for_role } => run_sources(&config, for_role.as_deref(), cli.pretty),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn block_on<F: std::future::Future<Output = anyhow::Result<()>>>(future: F) -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(future)
}

/// Priority: flags > environment > config file > defaults
fn load_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let file_config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let mut config = file_config.with_env();
    if let Some(profile) = &cli.profile {
        config.profile_dir = Some(profile.clone());
    }
    if let Some(role) = &cli.role {
        config.role = Some(role.clone());
    }
    Ok(config.into_core_config())
}
