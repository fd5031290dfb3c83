mod config;
mod graphql;
mod http;
mod seed;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DbPool, SeaOrmDealStore};
use platform_obs::{ObsConfig, init_tracing};
use products_crm::{DealFilter, NoticeLevel, PipelineBoard, build_report};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "pipeline-server", version, about = "CRM pipeline board service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert demo deals into an empty database.
    Seed,
    /// Print the board (or the pipeline report) as JSON.
    Board(BoardCommand),
    /// Print the GraphQL schema snapshot.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug, Default)]
struct BoardCommand {
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long, default_value = "")]
    stage: String,
    #[arg(long, default_value = "")]
    min_value: String,
    #[arg(long, default_value = "")]
    max_value: String,
    #[arg(long, default_value = "")]
    start_date: String,
    #[arg(long, default_value = "")]
    end_date: String,
    #[arg(long, default_value = "")]
    contact: String,
    #[arg(long, help = "Print the pipeline report instead of the columns")]
    report: bool,
}

impl From<&BoardCommand> for DealFilter {
    fn from(value: &BoardCommand) -> Self {
        DealFilter {
            query: value.query.clone(),
            stage: value.stage.clone(),
            min_value: value.min_value.clone(),
            max_value: value.max_value.clone(),
            start_date: value.start_date.clone(),
            end_date: value.end_date.clone(),
            contact: value.contact.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    match cli.command {
        Command::SchemaPrint { output } => schema_print(output),
        command => run(command, AppConfig::load()?).await,
    }
}

async fn run(command: Command, app_config: AppConfig) -> Result<()> {
    match command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up(&app_config).await,
            MigrateCommand::Down => migrate_down(&app_config).await,
        },
        Command::Seed => run_seed(&app_config).await,
        Command::Board(cmd) => print_board(cmd, &app_config).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from("schema.graphql"));
    std::fs::write(&target, graphql::schema_sdl())
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(path = %target.display(), "schema snapshot written");
    Ok(())
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    config.database.connect().await.map_err(Into::into)
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    let store = SeaOrmDealStore::new(pool);
    seed::seed_demo(&store).await?;
    Ok(())
}

async fn print_board(cmd: BoardCommand, config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    ensure_migrations(&pool, false).await?;
    let board = PipelineBoard::new(Arc::new(SeaOrmDealStore::new(pool)));
    board.load().await?;
    let json = if cmd.report {
        let deals = board.snapshot().deals;
        serde_json::to_string_pretty(&build_report(
            &deals,
            chrono::Utc::now(),
            products_crm::report::DEFAULT_RECENT_DAYS,
            products_crm::report::DEFAULT_TOP_LIMIT,
        ))?
    } else {
        serde_json::to_string_pretty(&board.view(&DealFilter::from(&cmd)))?
    };
    println!("{json}");
    Ok(())
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let store = Arc::new(SeaOrmDealStore::new(pool.clone()));
    let board = Arc::new(PipelineBoard::with_notice_capacity(
        store,
        config.notice_capacity,
    ));
    spawn_notice_log(&board);
    if let Err(err) = board.load().await {
        warn!(error = %err, "initial deal load failed; serving with an empty board");
    }
    let state = AppState {
        pool,
        schema: graphql::build_schema(board.clone()),
        board,
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    };
    http::serve(ServeConfig::from(&cmd), state).await
}

/// Mirrors board notices into the log; the server has no toast surface.
fn spawn_notice_log(board: &graphql::BoardHandle) {
    let mut notices = board.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => match notice.level {
                    NoticeLevel::Success => info!(message = %notice.message, "board notice"),
                    NoticeLevel::Error => warn!(message = %notice.message, "board notice"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "board notice log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_flags_become_filter() {
        let cli = Cli::parse_from([
            "pipeline-server",
            "board",
            "--stage",
            "proposal",
            "--min-value",
            "1500",
        ]);
        let Command::Board(cmd) = cli.command else {
            panic!("expected board command");
        };
        let filter = DealFilter::from(&cmd);
        assert_eq!(filter.stage, "proposal");
        assert_eq!(filter.min_value, "1500");
        assert!(filter.query.is_empty());
        assert!(!cmd.report);
    }
}
