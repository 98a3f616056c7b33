use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use outreach_client::config::{self, CliArgs, Command, Config};
use outreach_client::{OutreachClient, ProspectQuery};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so clap sees its values as env vars
    dotenvy::dotenv().ok();

    let mut args = CliArgs::parse();

    // Prompt for whatever credentials are missing
    if config::needs_interactive_setup(&args) {
        config::run_interactive_setup(&mut args)?;
    }

    let config = Config::from_args(&args)?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for responses
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Outreach client starting...");
    tracing::debug!(
        "Endpoints: auth={} api={}/{}",
        config.auth_endpoint,
        config.api_endpoint,
        config.api_version
    );

    match config.ca_bundle {
        Some(ref bundle) => tracing::info!(
            "🔒 Trust anchors: {} ({:?})",
            bundle.display(),
            config.hostname_policy
        ),
        None => tracing::debug!("Trust anchors: default roots"),
    }

    let client = config.build_client()?;
    tracing::info!("✅ Client initialized");

    let response = match run(&client, &args.command).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("❌ Request failed: {:#}", e);
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Execute a single subcommand
async fn run(client: &OutreachClient, command: &Command) -> Result<Value> {
    let response = match command {
        Command::Info => client.get_info().await?,
        Command::Prospect { id } => client.get_prospect(*id).await?,
        Command::Prospects {
            first_name,
            last_name,
            company,
            email,
            page,
        } => {
            let mut filter = ProspectQuery::new();
            if let Some(v) = first_name {
                filter = filter.first_name(v);
            }
            if let Some(v) = last_name {
                filter = filter.last_name(v);
            }
            if let Some(v) = company {
                filter = filter.company_name(v);
            }
            if let Some(v) = email {
                filter = filter.email(v);
            }
            if let Some(p) = page {
                filter = filter.page(*p);
            }
            client.get_prospects(&filter).await?
        }
        Command::Sequences { page } => client.get_sequences(*page).await?,
        Command::AddProspect { file } => client.add_prospect(&read_json(file)?).await?,
        Command::ModifyProspect { id, file } => {
            client.modify_prospect(*id, &read_json(file)?).await?
        }
        Command::AddToSequence { id, file } => {
            client
                .add_prospects_to_sequence(*id, &read_json(file)?)
                .await?
        }
    };

    Ok(response)
}

fn read_json(path: &str) -> Result<Value> {
    let path = config::expand_tilde(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
