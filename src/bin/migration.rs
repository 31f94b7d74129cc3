use clap::{Parser, Subcommand};
use pantry_api::{config, db, migrator::Migrator};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "migration", about = "Manage the pantry ledger database schema", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        help = "Database URL; defaults to the configured database_url"
    )]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back migrations
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop every table and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_tracing("info", false);

    let mut db_cfg = db::DbConfig::default();
    db_cfg.url = match cli.database_url {
        Some(url) => url,
        None => config::load_config()?.database_url,
    };
    db_cfg.max_connections = 2;

    let pool = db::establish_connection_with_config(&db_cfg).await?;
    let command = cli.command.unwrap_or(Command::Up);

    let result = match command {
        Command::Up => Migrator::up(&pool, None).await,
        Command::Down { steps } => Migrator::down(&pool, Some(steps)).await,
        Command::Status => Migrator::status(&pool).await,
        Command::Fresh => Migrator::fresh(&pool).await,
    };

    if let Err(e) = result {
        error!("Migration command failed: {}", e);
        return Err(e.into());
    }

    info!("Migration command completed");
    db::close_pool(pool).await?;
    Ok(())
}
