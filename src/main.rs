use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use cryptofolio::core::insights::{SortBy, SortDirection};
use cryptofolio::core::log::init_logging;
use cryptofolio::core::transfer::TransferRequest;
use cryptofolio::{AllocationBy, AppCommand, HoldingCommand};
use rust_decimal::Decimal;

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

#[derive(Clone, Copy, ValueEnum)]
enum Dimension {
    Crypto,
    Platform,
}

#[derive(Subcommand)]
enum HoldingCommands {
    /// Record a quantity of a crypto held on a platform
    Add {
        crypto_id: String,
        platform_id: String,
        quantity: Decimal,
    },
    /// Change the quantity of a holding
    Update { id: String, quantity: Decimal },
    /// Delete a holding
    Remove { id: String },
    /// List all holdings
    List,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display total value and the top 24h gainer
    Overview,
    /// Display allocation across cryptos or platforms
    Allocation {
        #[arg(long, value_enum, default_value = "crypto")]
        by: Dimension,
    },
    /// Display one crypto split across platforms
    Crypto { id: String },
    /// Display one platform split across cryptos
    Platform { id: String },
    /// Display held cryptos with market data, page by page
    Cryptos {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// percentage, quantity, price, max-supply, 24h, 7d or 30d
        #[arg(long, default_value = "percentage")]
        sort: SortBy,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },
    /// Manage holdings
    #[command(subcommand)]
    Holding(HoldingCommands),
    /// Move a quantity from a holding to another platform
    Transfer {
        holding_id: String,
        platform_id: String,
        quantity: Decimal,
        /// Network fee paid for the transfer
        #[arg(long, default_value = "0")]
        fee: Decimal,
        /// Deliver the full quantity and take the fee from the source on top
        #[arg(long)]
        send_full: bool,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Overview => AppCommand::Overview,
            Commands::Allocation { by } => AppCommand::Allocation(match by {
                Dimension::Crypto => AllocationBy::Crypto,
                Dimension::Platform => AllocationBy::Platform,
            }),
            Commands::Crypto { id } => AppCommand::Crypto(id),
            Commands::Platform { id } => AppCommand::Platform(id),
            Commands::Cryptos { page, sort, asc } => AppCommand::Cryptos {
                page: page.saturating_sub(1),
                sort_by: sort,
                direction: if asc {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
            },
            Commands::Holding(holding) => AppCommand::Holding(match holding {
                HoldingCommands::Add {
                    crypto_id,
                    platform_id,
                    quantity,
                } => HoldingCommand::Add {
                    crypto_id,
                    platform_id,
                    quantity,
                },
                HoldingCommands::Update { id, quantity } => HoldingCommand::Update { id, quantity },
                HoldingCommands::Remove { id } => HoldingCommand::Remove { id },
                HoldingCommands::List => HoldingCommand::List,
            }),
            Commands::Transfer {
                holding_id,
                platform_id,
                quantity,
                fee,
                send_full,
            } => AppCommand::Transfer(TransferRequest {
                source_holding_id: holding_id,
                destination_platform_id: platform_id,
                quantity_to_transfer: quantity,
                network_fee: fee,
                send_full_quantity: send_full,
            }),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => cryptofolio::cli::setup::setup_at_path(path),
            None => cryptofolio::cli::setup::setup(),
        },
        Some(cmd) => cryptofolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
