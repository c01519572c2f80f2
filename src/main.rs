use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use bbox_annotator::app::AnnotatorApp;
use bbox_annotator::config::{CommonArgs, Config, DEFAULT_CACHE_CAPACITY, init_logging};
use bbox_annotator::session::Session;
use clap::Parser;
use eframe::egui;
use log::info;

/// Draw one bounding box per image, category by category.
#[derive(Debug, Parser)]
#[command(name = "bbox-annotator", version)]
struct GuiArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory the CSV exports are written to
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Number of decoded images kept in memory
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,
}

fn main() -> Result<()> {
    let args = GuiArgs::parse();
    init_logging(args.common.log_level);

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::from_args(&args.common, &cwd)
        .with_export_dir(&args.export_dir)
        .with_cache_capacity(args.cache_capacity);
    info!(
        "images from {}, boxes in {}",
        config.image_root.display(),
        config.db_path.display()
    );
    let session = Session::open(config).context("failed to open the box database")?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1240.0, 680.0])
            .with_title("Bounding Box Annotator"),
        ..Default::default()
    };
    eframe::run_native(
        "Bounding Box Annotator",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Box::new(AnnotatorApp::new(session))
        }),
    )
    .map_err(|e| anyhow!("GUI failed: {e}"))
}
