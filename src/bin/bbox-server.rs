use anyhow::{Context, Result};
use bbox_annotator::config::{CommonArgs, Config, init_logging};
use bbox_annotator::server::{Api, serve};
use bbox_annotator::store::BoxStore;
use clap::Parser;
use log::info;

/// Serves stored boxes, categories and images over HTTP.
#[derive(Debug, Parser)]
#[command(name = "bbox-server", version)]
struct ServerArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Address to listen on
    #[arg(long, env = "ANNOTATOR_ADDR", default_value = "127.0.0.1:5000")]
    addr: String,
}

fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_logging(args.common.log_level);

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::from_args(&args.common, &cwd);
    let store = BoxStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    info!("serving images from {}", config.image_root.display());

    let api = Api::new(store, config.image_root);
    serve(&api, &args.addr)?;
    Ok(())
}
