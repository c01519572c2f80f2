//! The annotation session: one context object owning the store, the image
//! cache and the navigator, driven by the GUI's button and pointer events.
//!
//! Failures never propagate out of the public operations. They become
//! [`Notice`]s and the session keeps its previous state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::categories::{category_from_path, image_id_from_path, list_categories, list_images};
use crate::config::Config;
use crate::error::Result;
use crate::export::{ExportOutcome, export_category};
use crate::geometry::{Placement, PointerEvent, map_drag};
use crate::navigation::{NavState, Navigator};
use crate::store::{BoxRecord, BoxStore, RecordId};
use crate::thumbnail::{ImageCache, Thumbnail};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// A question the user has to answer before navigation continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    CycleCategory {
        finished: String,
        next_index: usize,
        next: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f32 / self.total as f32
        }
    }
}

/// The image currently on the canvas.
#[derive(Debug)]
pub struct Displayed {
    pub path: PathBuf,
    pub image_id: String,
    pub category: String,
    pub thumbnail: Arc<Thumbnail>,
    pub placement: Placement,
    /// Box already stored for this image, drawn in its own colour.
    pub stored: Option<BoxRecord>,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    start: PointerEvent,
    current: PointerEvent,
}

pub struct Session {
    config: Config,
    store: BoxStore,
    cache: ImageCache,
    nav: Navigator,
    displayed: Option<Displayed>,
    drag: Option<Drag>,
    last_saved: Option<RecordId>,
    prompt: Option<Prompt>,
    progress: Option<Progress>,
    notices: Vec<Notice>,
}

impl Session {
    /// Opens the database named in `config` and scans the categories.
    pub fn open(config: Config) -> Result<Self> {
        let store = BoxStore::open(&config.db_path)?;
        Ok(Self::new(config, store))
    }

    pub fn new(config: Config, store: BoxStore) -> Self {
        let cache = ImageCache::new(config.cache_capacity, config.display_size);
        let mut session = Self {
            config,
            store,
            cache,
            nav: Navigator::default(),
            displayed: None,
            drag: None,
            last_saved: None,
            prompt: None,
            progress: None,
            notices: vec![],
        };
        session.reload_categories();
        session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &BoxStore {
        &self.store
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn categories(&self) -> &[String] {
        self.nav.categories()
    }

    pub fn images(&self) -> &[PathBuf] {
        self.nav.images()
    }

    pub fn displayed(&self) -> Option<&Displayed> {
        self.displayed.as_ref()
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.progress
    }

    /// Id of the box the undo action would delete.
    pub fn last_saved(&self) -> Option<RecordId> {
        self.last_saved
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            message,
        });
    }

    fn notify_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            message,
        });
    }

    /// Rescans the image root. On failure the current list is kept.
    pub fn reload_categories(&mut self) {
        let root = self.config.image_root.clone();
        match list_categories(&root) {
            Ok(categories) => {
                info!("found {} categories in {}", categories.len(), root.display());
                if categories.is_empty() {
                    self.notify_info(format!("No categories found in {}.", root.display()));
                }
                self.nav.set_categories(categories);
                self.reset_image_state();
                self.progress = None;
            }
            Err(e) => self.notify_error(format!("Could not load categories: {e}")),
        }
    }

    fn reset_image_state(&mut self) {
        self.displayed = None;
        self.drag = None;
        self.last_saved = None;
        self.prompt = None;
    }

    pub fn select_category(&mut self, index: usize) {
        let Some(name) = self.nav.categories().get(index).cloned() else {
            warn!("no category at index {index}");
            return;
        };
        let images = match list_images(&self.config.image_root.join(&name)) {
            Ok(images) => images,
            Err(e) => {
                self.notify_error(format!("Could not open category '{name}': {e}"));
                return;
            }
        };

        if images.is_empty() {
            self.reset_image_state();
            self.nav.select(index, images);
            self.notify_info(format!("No images found in category '{name}'."));
            self.refresh_progress();
            return;
        }

        // nothing is committed until one image of the new category decodes
        let mut first = None;
        for (i, path) in images.iter().enumerate() {
            match self.cache.load(path) {
                Ok(thumbnail) => {
                    first = Some((i, path.clone(), thumbnail));
                    break;
                }
                Err(e) => self.notify_error(format!("Could not load image: {e}")),
            }
        }
        let Some((image_index, path, thumbnail)) = first else {
            warn!("no image in '{name}' could be shown, keeping the current view");
            return;
        };

        info!("selected category '{name}' ({} images)", images.len());
        self.reset_image_state();
        self.nav.select(index, images);
        self.display(image_index, path, thumbnail);
        self.refresh_progress();
    }

    /// Whether a category is selected; if not, tells the user to pick one.
    pub fn require_category(&mut self) -> bool {
        if self.nav.selected_index().is_some() {
            return true;
        }
        self.notify_info("Please select a category first.");
        false
    }

    /// Advances to the next image. Past the last one, asks whether to move
    /// on to the next category.
    pub fn next_image(&mut self) {
        if self.prompt.is_some() {
            return;
        }
        let Some(finished) = self.nav.selected_category().map(str::to_owned) else {
            self.notify_info("Please select a category first.");
            return;
        };
        let candidates = self.nav.forward_candidates();
        if self.show_first_of(candidates) {
            return;
        }
        if let Some(next_index) = self.nav.next_category_index() {
            let next = self.nav.categories()[next_index].clone();
            debug!("end of '{finished}', offering '{next}'");
            self.prompt = Some(Prompt::CycleCategory {
                finished,
                next_index,
                next,
            });
        }
    }

    pub fn previous_image(&mut self) {
        if self.prompt.is_some() {
            return;
        }
        if !self.require_category() {
            return;
        }
        let mut candidates = self.nav.backward_candidates().peekable();
        if candidates.peek().is_none() {
            self.notify_info("This is the first image in the category. There is no previous image.");
            return;
        }
        self.show_first_of(candidates);
    }

    /// Answers the pending prompt. `yes` moves to the offered category.
    pub fn answer_prompt(&mut self, yes: bool) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        match prompt {
            Prompt::CycleCategory { next_index, .. } if yes => self.select_category(next_index),
            Prompt::CycleCategory { finished, .. } => self.notify_info(format!(
                "All images in '{finished}' have been processed. Please choose a new category."
            )),
        }
    }

    /// Shows the image at `index` of the current category.
    pub fn jump_to(&mut self, index: usize) {
        if self.prompt.is_some() || index >= self.nav.images().len() {
            return;
        }
        self.show_first_of(std::iter::once(index));
    }

    /// Displays the first candidate that decodes. Each failure is reported
    /// and skipped; if none decode, nothing changes.
    fn show_first_of(&mut self, candidates: impl IntoIterator<Item = usize>) -> bool {
        for index in candidates {
            let Some(path) = self.nav.images().get(index).cloned() else {
                continue;
            };
            match self.cache.load(&path) {
                Ok(thumbnail) => {
                    self.display(index, path, thumbnail);
                    return true;
                }
                Err(e) => self.notify_error(format!("Could not load image: {e}")),
            }
        }
        false
    }

    fn display(&mut self, index: usize, path: PathBuf, thumbnail: Arc<Thumbnail>) {
        let image_id = image_id_from_path(&path);
        let category = category_from_path(&path);
        let (area_w, area_h) = self.config.display_size;
        let placement = Placement::centered(area_w, area_h, thumbnail.width(), thumbnail.height());
        let stored = match self.store.get_record(&image_id, &category) {
            Ok(record) => record,
            Err(e) => {
                self.notify_error(format!("Could not read stored box: {e}"));
                None
            }
        };

        self.nav.show(index);
        self.drag = None;
        self.last_saved = stored.as_ref().map(|r| r.id);
        debug!("displaying {} at {placement:?}", path.display());
        self.displayed = Some(Displayed {
            path,
            image_id,
            category,
            thumbnail,
            placement,
            stored,
        });
    }

    pub fn pointer_pressed(&mut self, at: PointerEvent) {
        if self.displayed.is_none() || self.prompt.is_some() {
            return;
        }
        self.drag = Some(Drag {
            start: at,
            current: at,
        });
    }

    pub fn pointer_moved(&mut self, at: PointerEvent) {
        if let Some(drag) = self.drag.as_mut() {
            drag.current = at;
        }
    }

    /// Finishes a drag. A box big enough to keep is stored and its id returned.
    pub fn pointer_released(&mut self, at: PointerEvent) -> Option<RecordId> {
        let drag = self.drag.take()?;
        let displayed = self.displayed.as_ref()?;
        let Some(coords) = map_drag(
            drag.start,
            at,
            Some(displayed.placement),
            self.config.min_box_size,
        ) else {
            debug!("ignoring drag below {} px", self.config.min_box_size);
            return None;
        };

        let image_id = displayed.image_id.clone();
        let category = displayed.category.clone();
        match self.store.upsert(&image_id, &category, coords) {
            Ok(id) => {
                info!("saved box for {category}/{image_id}");
                self.last_saved = Some(id);
                if let Some(displayed) = self.displayed.as_mut() {
                    displayed.stored = Some(BoxRecord {
                        id,
                        image_id,
                        category,
                        coords,
                    });
                }
                self.refresh_progress();
                Some(id)
            }
            Err(e) => {
                self.notify_error(format!("Could not save bounding box: {e}"));
                None
            }
        }
    }

    /// The rectangle being dragged, clamped to the image, in display space.
    pub fn in_progress(&self) -> Option<(PointerEvent, PointerEvent)> {
        let drag = self.drag?;
        let placement = self.displayed.as_ref()?.placement;
        Some((placement.clamp(drag.start), placement.clamp(drag.current)))
    }

    /// Deletes the most recently saved or loaded box.
    pub fn undo_last_box(&mut self) {
        let Some(id) = self.last_saved else {
            self.notify_info("No bounding box to delete.");
            return;
        };
        match self.store.delete(id) {
            Ok(removed) => {
                self.last_saved = None;
                if let Some(displayed) = self.displayed.as_mut() {
                    if displayed.stored.as_ref().is_some_and(|r| r.id == id) {
                        displayed.stored = None;
                    }
                }
                self.refresh_progress();
                if removed {
                    self.notify_info("Bounding box deleted.");
                } else {
                    self.notify_info("The bounding box had already been removed.");
                }
            }
            Err(e) => self.notify_error(format!("Could not delete bounding box: {e}")),
        }
    }

    /// Exports the selected category's boxes to the export directory.
    pub fn export_current(&mut self) {
        let Some(category) = self.nav.selected_category().map(str::to_owned) else {
            self.notify_info("Please select a category first.");
            return;
        };
        match export_category(&self.store, &category, &self.config.export_dir) {
            Ok(ExportOutcome::Written { path, rows }) => self.notify_info(format!(
                "Exported {rows} bounding boxes to {}.",
                path.display()
            )),
            Ok(ExportOutcome::Empty) => self.notify_info(format!(
                "No bounding boxes stored for '{category}'; nothing exported."
            )),
            Err(e) => self.notify_error(format!("Export failed: {e}")),
        }
    }

    /// Whether the image at `path` already has a stored box.
    pub fn is_processed(&self, path: &Path) -> bool {
        self.store
            .is_processed(&image_id_from_path(path), &category_from_path(path))
            .unwrap_or_else(|e| {
                warn!("{e}");
                false
            })
    }

    fn refresh_progress(&mut self) {
        let Some(category) = self.nav.selected_category() else {
            self.progress = None;
            return;
        };
        let done: HashSet<String> = match self.store.list(category) {
            Ok(records) => records.into_iter().map(|r| r.image_id).collect(),
            Err(e) => {
                warn!("could not compute progress: {e}");
                return;
            }
        };
        let images = self.nav.images();
        let processed = images
            .iter()
            .filter(|p| done.contains(&image_id_from_path(p)))
            .count();
        self.progress = Some(Progress {
            processed,
            total: images.len(),
        });
    }
}
