use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xconv::core::CurrencyCode;
use xconv::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for xconv::AppCommand {
    fn from(cmd: Commands) -> xconv::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                xconv::AppCommand::Convert { amount, from, to }
            }
            Commands::Rates { base } => xconv::AppCommand::Rates { base },
            Commands::Session => xconv::AppCommand::Session,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Source currency, e.g. USD
        #[arg(short, long)]
        from: Option<CurrencyCode>,
        /// Target currency, e.g. INR
        #[arg(short, long)]
        to: Option<CurrencyCode>,
    },
    /// Display all exchange rates for a base currency
    Rates {
        /// Base currency, e.g. EUR
        #[arg(short, long)]
        base: Option<CurrencyCode>,
    },
    /// Start an interactive conversion session
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xconv::cli::setup::setup(),
        Some(cmd) => xconv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
