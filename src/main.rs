use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use newsdesk::auth::credentials;
use newsdesk::auth::policy::Role;
use newsdesk::backup::{self, BackupKind};
use newsdesk::config::{Cli, Command, Config};
use newsdesk::db;
use newsdesk::notify::OutboxTransport;
use newsdesk::routes;
use newsdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(AppState::new(pool, config.clone()), &config).await,
        Command::Backup { structure, cleanup } => {
            let kind = if structure {
                BackupKind::Structure
            } else {
                BackupKind::Full
            };
            let mailer = Arc::new(OutboxTransport::new(pool.clone()));
            let run = backup::run_backup(pool, &config, mailer, kind, cleanup).await?;
            if !run.report.success {
                anyhow::bail!(
                    "backup failed: {}",
                    run.report.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!(
                "{} ({} bytes, {} tables)",
                run.report.filename.as_deref().unwrap_or_default(),
                run.report.size,
                run.report.tables
            );
            for removed in &run.removed {
                println!("removed {}", removed);
            }
            Ok(())
        }
        Command::SetRole { username, role } => {
            let role = Role::parse(&role)
                .with_context(|| format!("unknown role '{}', expected admin, employee, client or user", role))?;
            credentials::set_role(&pool, &username, role)?;
            println!("{} is now {}", username, role);
            Ok(())
        }
        Command::MakeClient { username, company } => {
            let profile = credentials::create_client_profile(&pool, &username, &company)?;
            println!("{} now owns client profile {}", username, profile.id);
            Ok(())
        }
    }
}

async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
