//! `scim-cli` — manage SCIM-provisioned users for an organization from the
//! command line.
//!
//! The bearer token comes from the `SCIM_TOKEN` environment variable so it
//! never appears in shell history or process listings.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bridge_scim::{Email, Name};
use bridge_scim_client::{ScimClient, ScimConfig, ServiceProvider};

#[derive(Parser)]
#[command(
    name = "scim-cli",
    version,
    about = "Manage SCIM-provisioned users for an organization"
)]
struct Cli {
    /// Organization name, e.g. "acme".
    #[arg(short = 'o', long)]
    org: String,

    /// API base URL.
    #[arg(long, default_value = "https://api.github.com")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List provisioned users, optionally narrowed by a SCIM filter such as
    /// 'userName eq "mtodd"'.
    List { filter: Option<String> },

    /// Provision a user.
    Add(AddArgs),

    /// Deprovision the user bound to GUID.
    Remove { guid: String },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    user_name: String,

    #[arg(long)]
    given_name: String,

    #[arg(long)]
    family_name: String,

    #[arg(long)]
    email: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let token =
        std::env::var("SCIM_TOKEN").context("SCIM_TOKEN environment variable is required")?;

    let client = ScimClient::new(&ScimConfig {
        org: cli.org,
        token,
        base_url: cli.base_url,
        dry_run: false,
    })?;

    match cli.command {
        Command::List { filter } => {
            let users = client.list_with_filter(filter.as_deref()).await?;
            for user in users {
                println!("{}", serde_json::to_string(&user)?);
            }
        }
        Command::Add(args) => {
            let mut user = bridge_scim::User::with_user_name(&args.user_name);
            user.external_id = Some(args.user_name.clone());
            user.name = Name {
                given_name: args.given_name,
                family_name: args.family_name,
            };
            user.emails = vec![Email {
                email_type: "work".to_string(),
                value: args.email,
                primary: true,
            }];

            let guid = client.add(&user).await?;
            println!("added {guid}");
        }
        Command::Remove { guid } => {
            client.delete(&guid).await?;
            println!("removed {guid}");
        }
    }

    Ok(())
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
