//! Pesa CLI - your mobile wallet in the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth, balance, currency, demo, history, kyc, lookup, notifications, profile, send, status,
    wallet,
};

/// Pesa - send and receive money from your terminal
#[derive(Parser)]
#[command(name = "pesa", version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password, or a Google/Apple ID token
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
        /// Sign in with a Google ID token
        #[arg(long, conflicts_with_all = ["email", "apple"])]
        google: Option<String>,
        /// Sign in with an Apple ID token
        #[arg(long, conflicts_with_all = ["email", "google"])]
        apple: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new account
    Signup {
        #[command(flatten)]
        args: auth::SignupArgs,
    },

    /// Sign out and clear cached account data
    Logout,

    /// Email a password reset link
    ResetPassword {
        email: String,
    },

    /// Show account, wallet and inbox summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show wallet details and spending limits
    Wallet {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the wallet balance, or hide/show it
    Balance {
        #[command(subcommand)]
        command: Option<balance::BalanceCommands>,
    },

    /// List recent transactions
    History {
        /// all, sent, received or pending
        #[arg(long, default_value = "all")]
        filter: String,
        /// Match description, reference or counterparty
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to another wallet
    Send {
        /// Recipient wallet ID
        wallet_id: String,
        /// Amount in your wallet's currency
        amount: String,
        /// Note shown to both parties
        #[arg(long)]
        note: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a wallet's owner before sending
    Lookup {
        wallet_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preferred currency and conversion
    Currency {
        #[command(subcommand)]
        command: Option<currency::CurrencyCommands>,
    },

    /// Manage the notification inbox
    Notifications {
        #[command(subcommand)]
        command: Option<notifications::NotificationCommands>,
    },

    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: Option<profile::ProfileCommands>,
    },

    /// Verify your identity
    Kyc {
        #[command(subcommand)]
        command: kyc::KycCommands,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pesa_core=debug,pesa_cli=debug")
    } else {
        EnvFilter::try_from_env("PESA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A second init (e.g. in tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&output::describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { email, google, apple, json } => auth::login(email, google, apple, json).await,
        Commands::Signup { args } => auth::signup(args).await,
        Commands::Logout => auth::logout().await,
        Commands::ResetPassword { email } => auth::reset_password(&email).await,
        Commands::Status { json } => status::run(json).await,
        Commands::Wallet { json } => wallet::run(json).await,
        Commands::Balance { command } => balance::run(command).await,
        Commands::History { filter, search, json } => {
            history::run(&filter, search.as_deref(), json).await
        }
        Commands::Send { wallet_id, amount, note, yes, json } => {
            send::run(&wallet_id, &amount, note, yes, json).await
        }
        Commands::Lookup { wallet_id, json } => lookup::run(&wallet_id, json).await,
        Commands::Currency { command } => currency::run(command).await,
        Commands::Notifications { command } => notifications::run(command).await,
        Commands::Profile { command } => profile::run(command).await,
        Commands::Kyc { command } => kyc::run(command).await,
        Commands::Demo { command } => demo::run(command),
    }
}
