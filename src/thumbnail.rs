//! Decoding images into display-sized thumbnails, and a bounded cache of them.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{GenericImageView, RgbaImage};
use log::debug;

use crate::error::{AnnotatorError, Result};

/// A decoded image, already scaled to fit the display area.
#[derive(Debug)]
pub struct Thumbnail {
    pixels: RgbaImage,
    source_size: (u32, u32),
}

impl Thumbnail {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Dimensions of the file before scaling.
    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }
}

/// Largest size with the same aspect ratio that fits in `max_w`×`max_h`.
/// Images that already fit keep their size.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let (max_w, max_h) = (max_w.max(1), max_h.max(1));
    if width <= max_w && height <= max_h {
        return (width.max(1), height.max(1));
    }
    let scale = f64::min(
        f64::from(max_w) / f64::from(width),
        f64::from(max_h) / f64::from(height),
    );
    let w = (f64::from(width) * scale).round() as u32;
    let h = (f64::from(height) * scale).round() as u32;
    (w.clamp(1, max_w), h.clamp(1, max_h))
}

/// Decodes `path` and scales it down to fit `max_w`×`max_h`.
pub fn decode_fit(path: &Path, max_w: u32, max_h: u32) -> Result<Thumbnail> {
    let img = image::open(path).map_err(|source| AnnotatorError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max_w, max_h);
    let img = if (tw, th) == (w, h) {
        img
    } else {
        img.resize_exact(tw, th, FilterType::Lanczos3)
    };
    Ok(Thumbnail {
        pixels: img.to_rgba8(),
        source_size: (w, h),
    })
}

/// Thumbnails keyed by file path, evicting the least recently used entry
/// once `capacity` is reached.
pub struct ImageCache {
    capacity: usize,
    max_size: (u32, u32),
    entries: HashMap<PathBuf, Arc<Thumbnail>>,
    // front = least recently used
    recency: VecDeque<PathBuf>,
}

impl ImageCache {
    pub fn new(capacity: usize, max_size: (u32, u32)) -> Self {
        Self {
            capacity: capacity.max(1),
            max_size,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Returns the cached thumbnail for `path`, decoding it on a miss.
    /// Decode failures are returned and not cached.
    pub fn load(&mut self, path: &Path) -> Result<Arc<Thumbnail>> {
        if let Some(thumb) = self.entries.get(path).cloned() {
            self.touch(path);
            return Ok(thumb);
        }

        let (max_w, max_h) = self.max_size;
        let thumb = Arc::new(decode_fit(path, max_w, max_h)?);
        debug!(
            "decoded {} ({}x{} -> {}x{})",
            path.display(),
            thumb.source_size().0,
            thumb.source_size().1,
            thumb.width(),
            thumb.height()
        );
        self.insert(path.to_path_buf(), Arc::clone(&thumb));
        Ok(thumb)
    }

    fn touch(&mut self, path: &Path) {
        if let Some(pos) = self.recency.iter().position(|p| p == path) {
            if let Some(p) = self.recency.remove(pos) {
                self.recency.push_back(p);
            }
        }
    }

    fn insert(&mut self, path: PathBuf, thumb: Arc<Thumbnail>) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!("evicted {} from image cache", oldest.display());
        }
        self.entries.insert(path.clone(), thumb);
        self.recency.push_back(path);
    }
}
