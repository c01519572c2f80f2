//! Position within the category list and the image list of the selected category.
//!
//! The navigator only tracks indices. Decoding happens in the session, which
//! commits a move with [`Navigator::show`] once the target image has loaded.

use std::iter::Rev;
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavState {
    #[default]
    NoCategory,
    CategorySelected,
    ImageDisplayed,
}

#[derive(Debug, Default)]
pub struct Navigator {
    categories: Vec<String>,
    selected: Option<usize>,
    images: Vec<PathBuf>,
    index: usize,
    state: NavState,
}

impl Navigator {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Replaces the category list and drops any selection.
    pub fn set_categories(&mut self, categories: Vec<String>) {
        *self = Self::new(categories);
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.categories.get(i))
            .map(String::as_str)
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(index, total)` while an image is displayed.
    pub fn position(&self) -> Option<(usize, usize)> {
        (self.state == NavState::ImageDisplayed).then_some((self.index, self.images.len()))
    }

    pub fn current_path(&self) -> Option<&Path> {
        match self.state {
            NavState::ImageDisplayed => self.images.get(self.index).map(PathBuf::as_path),
            _ => None,
        }
    }

    /// Enters `CategorySelected` for `category_index` with a fresh image list.
    pub fn select(&mut self, category_index: usize, images: Vec<PathBuf>) {
        self.selected = Some(category_index);
        self.images = images;
        self.index = 0;
        self.state = NavState::CategorySelected;
    }

    /// Commits `index` as the displayed image.
    pub fn show(&mut self, index: usize) -> bool {
        if self.selected.is_none() || index >= self.images.len() {
            return false;
        }
        self.index = index;
        self.state = NavState::ImageDisplayed;
        true
    }

    /// Indices to try, in order, when moving forward.
    pub fn forward_candidates(&self) -> Range<usize> {
        match self.state {
            NavState::NoCategory => 0..0,
            NavState::CategorySelected => self.index..self.images.len(),
            NavState::ImageDisplayed => self.index + 1..self.images.len(),
        }
    }

    /// Indices to try, nearest first, when moving back.
    pub fn backward_candidates(&self) -> Rev<Range<usize>> {
        match self.state {
            NavState::ImageDisplayed => (0..self.index).rev(),
            _ => (0..0).rev(),
        }
    }

    /// The category after the selected one, wrapping to the first.
    pub fn next_category_index(&self) -> Option<usize> {
        let current = self.selected?;
        if self.categories.is_empty() {
            return None;
        }
        Some((current + 1) % self.categories.len())
    }
}
