//! `contactctl`: operator console for the contact inbox.
//!
//! Browse, filter, inspect and transition contact submissions on an
//! OpenERP server from a terminal.

mod commands;
mod config;

use clap::{Args, Parser, Subcommand};
use openerp_contact::{FilterSpec, SubmissionStatus};
use tracing_subscriber::EnvFilter;

use commands::Output;

/// Contact inbox CLI.
#[derive(Parser, Debug)]
#[command(name = "contactctl", about = "Contact inbox operator console")]
struct Cli {
    /// Path to client config file (default: ~/.openerp/contact.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Context to use instead of the current one.
    #[arg(long = "context", global = true)]
    context: Option<String>,

    /// Output format.
    #[arg(long = "output", short = 'o', global = true, value_enum, default_value = "table")]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage server contexts.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// List submissions matching a filter.
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show one submission and mark it read.
    Show { id: String },

    /// Mark a submission read.
    Read { id: String },

    /// Mark a submission unread.
    Unread { id: String },

    /// Move a submission to another status.
    Status {
        id: String,
        /// pending, in-progress, resolved or closed.
        #[arg(value_parser = parse_status)]
        status: SubmissionStatus,
    },

    /// Delete a submission.
    Delete {
        id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Unread and total counters, plus a status breakdown of the filter.
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ContextAction {
    /// Create or update a context.
    Set {
        name: String,
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Switch the current context.
    Use { name: String },
    /// List all contexts.
    List,
    /// Delete a context.
    Delete { name: String },
}

/// Filter flags shared by `list` and `stats`. Values pass through verbatim;
/// the server rejects ones it does not know.
#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long, default_value = openerp_contact::model::ANY)]
    status: String,
    #[arg(long, default_value = openerp_contact::model::ANY)]
    category: String,
    /// true, false or all.
    #[arg(long, default_value = openerp_contact::model::ANY)]
    read: String,
    /// Free-text search over name, email, subject and message.
    #[arg(long, default_value = "")]
    search: String,
}

impl From<FilterArgs> for FilterSpec {
    fn from(a: FilterArgs) -> Self {
        FilterSpec {
            status: a.status,
            category: a.category,
            is_read: a.read,
            search: a.search,
        }
    }
}

fn parse_status(s: &str) -> Result<SubmissionStatus, String> {
    SubmissionStatus::parse(s).ok_or_else(|| {
        let known: Vec<&str> = SubmissionStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{}' (expected one of: {})", s, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);

    let connect = || commands::submissions::connect(&config_path, cli.context.as_deref());

    match cli.command {
        Commands::Context { action } => match action {
            ContextAction::Set { name, server, token } => {
                commands::context::set(&name, server.as_deref(), token.as_deref(), &config_path)?;
            }
            ContextAction::Use { name } => {
                commands::context::use_context(&name, &config_path)?;
            }
            ContextAction::List => {
                commands::context::list(&config_path)?;
            }
            ContextAction::Delete { name } => {
                commands::context::delete(&name, &config_path)?;
            }
        },

        Commands::List { filter } => {
            commands::submissions::list(&connect()?, filter.into(), cli.output).await?;
        }

        Commands::Show { id } => {
            commands::submissions::show(&connect()?, &id, cli.output).await?;
        }

        Commands::Read { id } => {
            commands::submissions::set_read(&connect()?, &id, true).await?;
        }

        Commands::Unread { id } => {
            commands::submissions::set_read(&connect()?, &id, false).await?;
        }

        Commands::Status { id, status } => {
            commands::submissions::set_status(&connect()?, &id, status).await?;
        }

        Commands::Delete { id, yes } => {
            commands::submissions::delete(&connect()?, &id, yes).await?;
        }

        Commands::Stats { filter } => {
            commands::submissions::stats(&connect()?, filter.into(), cli.output).await?;
        }

        Commands::Version => {
            println!("contactctl v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
