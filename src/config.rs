//! Command-line options, resolved settings and logging setup.

use std::path::{Path, PathBuf};

use clap::Args;
use glob::{Pattern, glob};
use log::{LevelFilter, info, warn};

use crate::error::{AnnotatorError, Result};
use crate::geometry::MIN_BOX_SIZE;

pub const DEFAULT_DB_FILE: &str = "bounding_boxes.db";
/// Folder searched for when no image root is given.
pub const IMAGE_FOLDER_NAME: &str = "img";
/// Canvas size; images are scaled down to fit it.
pub const DISPLAY_SIZE: (u32, u32) = (800, 600);
pub const PREVIEW_SIZE: u32 = 100;
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Options shared by the desktop app and the HTTP server.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Folder holding one subdirectory per category [default: first `img` folder found below the working directory]
    #[arg(long, env = "ANNOTATOR_IMAGE_ROOT")]
    pub image_root: Option<PathBuf>,

    /// SQLite database holding the boxes
    #[arg(long, env = "ANNOTATOR_DB", default_value = DEFAULT_DB_FILE)]
    pub db: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub image_root: PathBuf,
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub cache_capacity: usize,
    pub display_size: (u32, u32),
    pub min_box_size: i32,
}

impl Config {
    pub fn new(image_root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            image_root: image_root.into(),
            db_path: db_path.into(),
            export_dir: PathBuf::from("."),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            display_size: DISPLAY_SIZE,
            min_box_size: MIN_BOX_SIZE,
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Builds a config from the shared options, searching `cwd` for an image
    /// root when none was given.
    pub fn from_args(args: &CommonArgs, cwd: &Path) -> Self {
        let image_root = resolve_image_root(args.image_root.clone(), cwd);
        Self::new(image_root, args.db.clone())
    }
}

/// The explicit root, else the first `img` folder below `start`, else `start/img`.
///
/// A missing folder is not fatal here: listing categories reports it later.
pub fn resolve_image_root(explicit: Option<PathBuf>, start: &Path) -> PathBuf {
    if let Some(root) = explicit {
        return root;
    }
    match find_image_root(IMAGE_FOLDER_NAME, start) {
        Ok(root) => {
            info!("using image root {}", root.display());
            root
        }
        Err(e) => {
            warn!("{e}");
            start.join(IMAGE_FOLDER_NAME)
        }
    }
}

/// Searches `start` and its subdirectories for a directory called `folder`.
/// A direct child wins; otherwise the first match in path order.
pub fn find_image_root(folder: &str, start: &Path) -> Result<PathBuf> {
    let direct = start.join(folder);
    if direct.is_dir() {
        return Ok(direct);
    }

    let pattern = format!(
        "{}/**/{}",
        Pattern::escape(&start.to_string_lossy()),
        Pattern::escape(folder)
    );
    glob(&pattern)?
        .flatten()
        .find(|p| p.is_dir())
        .ok_or_else(|| AnnotatorError::ImageRootNotFound {
            folder: folder.to_string(),
            start: start.to_path_buf(),
        })
}

/// Installs the global logger. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
