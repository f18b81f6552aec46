//! Print (or apply) the table definitions of a configured archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use muninn_core::config::MuninnConfig;
use muninn_core::ddl::archive_script;
use muninn_core::registry::ArchiveRegistry;

/// Generate the SQL tables of a muninn archive.
#[derive(Parser, Debug)]
#[command(name = "muninn-startapp", version, about = "Create the tables of a muninn archive")]
struct Cli {
    /// Name of the archive in the configuration file
    archive: String,

    /// Archive configuration file (defaults to $MUNINN_CONFIG, then muninn.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execute the statements against $DATABASE_URL instead of printing them
    #[arg(long)]
    apply: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let path = args
        .config
        .or_else(|| std::env::var_os("MUNINN_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("muninn.toml"));
    let config = MuninnConfig::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let registry = ArchiveRegistry::from_config(config);
    let archive = registry.get(&args.archive).with_context(|| {
        format!(
            "archive '{}' is not configured in {}",
            args.archive,
            path.display()
        )
    })?;

    if !args.apply {
        print!("{}", archive_script(archive.config()));
        return Ok(());
    }

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = muninn_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    muninn_db::ensure_archive_schema(&pool, &archive)
        .await
        .with_context(|| format!("Failed to create tables of archive '{}'", args.archive))?;
    println!("created tables of archive '{}'", args.archive);
    Ok(())
}
