use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use cmms_api::{
    auth::{AuthConfig, AuthService, AuthUser, Role},
    config::{self, AppConfig},
    db::{self, DbPool},
    events::{self, EventSender},
    openapi::ApiDocV1,
    services::bom_sync::BomSyncService,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "cmms-admin", about = "Maintenance tasks for the CMMS parts backend", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending database migrations
    Migrate,
    /// Reconcile the parts catalog against every asset's bill of materials
    SyncParts,
    /// Mint a bearer token for local testing
    IssueToken(IssueTokenArgs),
    /// Print the OpenAPI document
    Openapi,
}

#[derive(clap::Args)]
struct IssueTokenArgs {
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    department: String,
    #[arg(long, default_value = "technician", value_parser = parse_role)]
    role: Role,
}

fn parse_role(value: &str) -> std::result::Result<Role, String> {
    Role::from_str(value.trim())
        .map_err(|_| format!("unknown role '{}'; expected admin, manager, technician or normal_user", value))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuedToken {
    token: String,
    user_id: String,
    role: Role,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Migrate => {
            let pool = connect(&cfg).await?;
            db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::SyncParts => {
            let pool = Arc::new(connect(&cfg).await?);
            let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
            let processor = tokio::spawn(events::process_events(rx));

            let report = {
                let sender = Arc::new(EventSender::new(tx));
                BomSyncService::new(pool, sender)
                    .run()
                    .await
                    .context("asset BOM sync failed")?
            };
            // All senders are gone once the service is dropped; let the processor drain.
            if let Err(e) = processor.await {
                debug!(error = %e, "event processor ended abnormally");
            }

            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Assets processed: {}\nParts created: {}\nParts linked: {}\nLines skipped: {}\nFailures: {}",
                    report.assets_processed,
                    report.parts_created,
                    report.parts_linked,
                    report.lines_skipped,
                    report.failures
                );
            }
        }
        Commands::IssueToken(args) => {
            let auth = AuthService::new(AuthConfig::from(&cfg));
            let user = AuthUser::new(args.user_id, args.name, args.department, args.role);
            let token = auth
                .issue_token(&user)
                .context("failed to issue token")?;

            if cli.json {
                print_json(&IssuedToken {
                    token,
                    user_id: user.id,
                    role: user.role,
                })?;
            } else {
                println!("{}", token);
            }
        }
        Commands::Openapi => {
            let document = ApiDocV1::openapi()
                .to_pretty_json()
                .context("failed to render OpenAPI document")?;
            println!("{}", document);
        }
    }

    Ok(())
}

async fn connect(cfg: &AppConfig) -> Result<DbPool> {
    debug!("connecting to {}", redact(&cfg.database_url));
    db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")
}

fn redact(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => url.to_string(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
