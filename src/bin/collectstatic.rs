//! Copies static assets into `STATIC_ROOT`, adding content-hashed copies,
//! their `.gz`/`.br` siblings and the `staticfiles.json` manifest.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use todos_api::{http::static_files::collect_static, infrastructure::settings::Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collectstatic")]
#[command(about = "Collect static files into STATIC_ROOT", long_about = None)]
struct Cli {
    /// Directory holding the source assets
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Output directory (defaults to STATIC_ROOT)
    #[arg(value_name = "DEST")]
    dest: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let dest = cli.dest.unwrap_or_else(|| settings.static_root.clone());
    let manifest = collect_static(&cli.source, &dest)?;
    tracing::info!(files = manifest.paths.len(), dest = %dest.display(), "static files collected");
    Ok(())
}
