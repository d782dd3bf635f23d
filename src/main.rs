use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use sgdf_intranet::utils::Timer;
use sgdf_intranet::{AppConfig, Collection, Credentials, FetchOptions, IntranetClient, PersonSource};

#[derive(Parser)]
#[command(name = "sgdf-intranet", about = "SGDF intranet member directory client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Adherent code used to log in
    #[arg(long, env = "INTRANET_CODE", global = true)]
    code: Option<String>,

    #[arg(long, env = "INTRANET_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and print the logged-in member id
    CheckLogin,

    /// Print the logged-in member's record
    Profile,

    /// Print one member's record by intranet id
    Person {
        /// Intranet id, as in `ResumeAdherent.aspx?id=...`
        iid: String,
    },

    /// Print every member visible from this account
    Roster {
        /// Pagination safety bound (default from config)
        #[arg(long)]
        max_pages: Option<usize>,
    },
}

#[derive(Serialize)]
struct LoginStatus<'a> {
    logged_in: bool,
    code: &'a str,
    iid: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "sgdf_intranet=info,warn",
        1 => "sgdf_intranet=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        AppConfig::default()
    });

    let credentials = Credentials::new(
        cli.code.unwrap_or_default(),
        cli.password.unwrap_or_default(),
    );

    let client = IntranetClient::connect(config.intranet, credentials.clone())
        .await
        .with_context(|| format!("Login failed for {}", credentials.identifier()))?;

    match cli.command {
        Command::CheckLogin => {
            let iid = client.check_login().await?;
            print_json(&LoginStatus {
                logged_in: true,
                code: credentials.identifier(),
                iid,
            })?;
        }

        Command::Profile => {
            let _t = Timer::start("Profile fetch");
            let person = client.fetch_profile().await.context("Profile fetch failed")?;
            print_json(&person)?;
        }

        Command::Person { iid } => {
            let _t = Timer::start(format!("Person fetch ({})", iid));
            let person = client
                .fetch_person(&iid)
                .await
                .with_context(|| format!("Fetch of member {} failed", iid))?;
            print_json(&person)?;
        }

        Command::Roster { max_pages } => {
            let _t = Timer::start("Roster fetch");
            let mut options = FetchOptions::default();
            options.max_pages = max_pages;

            let roster = client.fetch_roster(&options).await.context("Roster fetch failed")?;
            report(&roster);
            print_json(&roster)?;
        }
    }

    client.close().await;
    Ok(())
}

fn report<T>(collection: &Collection<T>) {
    for d in &collection.diagnostics {
        warn!("{}", d);
    }
    info!(
        "Done: {} records, {} diagnostics{}",
        collection.records.len(),
        collection.diagnostics.len(),
        if collection.complete { "" } else { ", listing incomplete" }
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{}", out);
    Ok(())
}
