//! CopyHub CLI - the marketplace from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the password is read from stdin when omitted)
//! copyhub login -e fan@example.com
//!
//! # Browse print shops and their prices
//! copyhub agencies
//! copyhub agencies --id 3
//!
//! # Price local PDFs, then place the order and get a checkout link
//! copyhub quote 3 thesis.pdf --paper A4 --color "Black & White" --sides "One sided" -c 2
//! copyhub quote 3 thesis.pdf --paper A4 --color "Black & White" --sides "One sided" --order
//!
//! # Follow orders
//! copyhub orders list --state Pending
//! copyhub orders set-state K3J9QX Confirmed
//! copyhub orders watch K3J9QX
//! ```
//!
//! # Environment Variables
//!
//! - `COPYHUB_API_URL` - Backend base URL (required)
//! - `COPYHUB_TOKEN_FILE` - Where tokens are kept (default: `$HOME/.copyhub/tokens.json`)
//! - `COPYHUB_SITE_URL` - Site the hosted checkout returns to (default: `http://localhost:3000`)
//! - `RUST_LOG` - Log filter (default: `warn`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use copyhub_core::{AgencyId, MIN_COPIES, OrderCode};

mod commands;
mod output;
mod tokens;

use commands::{Context, quote::JobOptions};

const DEFAULT_SITE_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "copyhub")]
#[command(author, version, about = "CopyHub print-shop marketplace from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        /// Password; read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored tokens
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List print shops, or show one shop's price list
    Agencies {
        /// Show this agency's price list
        #[arg(long)]
        id: Option<AgencyId>,

        /// Filter by name or city
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Price PDF files at an agency
    Quote {
        /// Agency to print with
        agency: AgencyId,

        /// PDF files to print
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Paper size (A3, A4, A5, Letter, Legal)
        #[arg(long)]
        paper: Option<String>,

        /// Color option ("Black & White" or "Color")
        #[arg(long)]
        color: Option<String>,

        /// Sides ("One sided" or "Two sided")
        #[arg(long)]
        sides: Option<String>,

        /// Number of copies
        #[arg(short, long, default_value_t = MIN_COPIES)]
        copies: u32,

        /// Place the order and print the checkout link
        #[arg(long)]
        order: bool,
    },
    /// Work with orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List your orders (agency and admin accounts see what they manage)
    List {
        /// Only orders in this state (name or number)
        #[arg(short, long)]
        state: Option<String>,
    },
    /// Show one order
    Show { code: String },
    /// Move an order to another state
    SetState { code: String, state: String },
    /// Record that the customer picked up a finished order
    Complete { code: String, pickup_code: String },
    /// Follow an order until it is picked up or rejected
    Watch {
        code: String,

        /// Seconds between checks
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn site_url() -> Result<url::Url, commands::CliError> {
    let raw = std::env::var("COPYHUB_SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.to_string());
    url::Url::parse(&raw)
        .map_err(|e| commands::CliError::Invalid(format!("Invalid COPYHUB_SITE_URL: {e}")))
}

async fn run(cli: Cli) -> commands::Result<()> {
    let ctx = Context::load()?;

    match cli.command {
        Commands::Login { email, password } => commands::auth::login(&ctx, &email, password).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Whoami => commands::auth::whoami(&ctx).await,
        Commands::Agencies { id: Some(id), .. } => commands::agencies::show(&ctx, id).await,
        Commands::Agencies { id: None, search } => {
            commands::agencies::list(&ctx, search.as_deref()).await
        }
        Commands::Quote {
            agency,
            files,
            paper,
            color,
            sides,
            copies,
            order,
        } => {
            let options = JobOptions {
                paper,
                color,
                sides,
                copies,
            };
            let site = order.then(site_url).transpose()?;
            commands::quote::run(&ctx, agency, &files, &options, site.as_ref()).await
        }
        Commands::Orders { action } => match action {
            OrdersAction::List { state } => commands::orders::list(&ctx, state.as_deref()).await,
            OrdersAction::Show { code } => {
                commands::orders::show(&ctx, &OrderCode::from(code)).await
            }
            OrdersAction::SetState { code, state } => {
                commands::orders::set_state(&ctx, &OrderCode::from(code), &state).await
            }
            OrdersAction::Complete { code, pickup_code } => {
                commands::orders::complete(&ctx, &OrderCode::from(code), &pickup_code).await
            }
            OrdersAction::Watch { code, interval } => {
                let every = Duration::from_secs(interval.max(1));
                commands::orders::watch(&ctx, &OrderCode::from(code), every).await
            }
        },
    }
}
