//! Bounding-box annotation for folders of categorized images.
//!
//! Images live under `<root>/<category>/`. The desktop binary shows them one
//! at a time and turns a mouse drag into a box that is stored per
//! `(image id, category)`. The server binary exposes the same store through a
//! small JSON API.

pub mod app;
pub mod categories;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod navigation;
pub mod server;
pub mod session;
pub mod store;
pub mod thumbnail;

pub use error::{AnnotatorError, Result};
