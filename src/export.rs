//! CSV export of the boxes stored for one category.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::{AnnotatorError, Result};
use crate::store::{BoxRecord, BoxStore};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Image ID")]
    image_id: &'a str,
    #[serde(rename = "Kategorie")]
    category: &'a str,
    #[serde(rename = "X1")]
    x1: i32,
    #[serde(rename = "Y1")]
    y1: i32,
    #[serde(rename = "X2")]
    x2: i32,
    #[serde(rename = "Y2")]
    y2: i32,
}

impl<'a> From<&'a BoxRecord> for ExportRow<'a> {
    fn from(r: &'a BoxRecord) -> Self {
        Self {
            image_id: &r.image_id,
            category: &r.category,
            x1: r.coords.x1,
            y1: r.coords.y1,
            x2: r.coords.x2,
            y2: r.coords.y2,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No boxes were stored, so no file was written.
    Empty,
    Written { path: PathBuf, rows: usize },
}

pub fn export_file_name(category: &str) -> String {
    format!("{category}_bounding_boxes.csv")
}

/// Writes a header plus one row per record.
pub fn write_csv<W: Write>(writer: W, records: &[BoxRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(ExportRow::from(record))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Exports every box of `category` to `{dir}/{category}_bounding_boxes.csv`.
///
/// The file is written under a temporary name and renamed into place, so a
/// failed export leaves no partial file behind.
pub fn export_category(store: &BoxStore, category: &str, dir: &Path) -> Result<ExportOutcome> {
    let records = store.list(category)?;
    if records.is_empty() {
        return Ok(ExportOutcome::Empty);
    }

    let file_name = export_file_name(category);
    let path = dir.join(&file_name);
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let written = File::create(&tmp)
        .map_err(|e| AnnotatorError::io(&tmp, e))
        .and_then(|file| write_csv(BufWriter::new(file), &records));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(AnnotatorError::io(&path, e));
    }

    info!("exported {} boxes to {}", records.len(), path.display());
    Ok(ExportOutcome::Written {
        path,
        rows: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoxCoords;
    use tempfile::tempdir;

    #[test]
    fn empty_category_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = BoxStore::open_in_memory().unwrap();
        store
            .upsert("x", "other", BoxCoords::from_corners(0, 0, 9, 9))
            .unwrap();

        let outcome = export_category(&store, "cats", dir.path()).unwrap();
        assert_eq!(outcome, ExportOutcome::Empty);
        assert!(!dir.path().join("cats_bounding_boxes.csv").exists());
    }

    #[test]
    fn export_writes_header_and_rows_for_one_category() {
        let dir = tempdir().unwrap();
        let store = BoxStore::open_in_memory().unwrap();
        store
            .upsert("b", "cats", BoxCoords::from_corners(20, 30, 200, 210))
            .unwrap();
        store
            .upsert("a", "cats", BoxCoords::from_corners(1, 2, 3, 4))
            .unwrap();
        store
            .upsert("c", "dogs", BoxCoords::from_corners(5, 5, 50, 50))
            .unwrap();

        let outcome = export_category(&store, "cats", dir.path()).unwrap();
        let path = dir.path().join("cats_bounding_boxes.csv");
        assert_eq!(
            outcome,
            ExportOutcome::Written {
                path: path.clone(),
                rows: 2
            }
        );

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Image ID,Kategorie,X1,Y1,X2,Y2\na,cats,1,2,3,4\nb,cats,20,30,200,210\n"
        );
        assert!(!dir.path().join(".cats_bounding_boxes.csv.tmp").exists());
    }

    #[test]
    fn missing_export_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let store = BoxStore::open_in_memory().unwrap();
        store
            .upsert("a", "cats", BoxCoords::from_corners(1, 2, 30, 40))
            .unwrap();

        let err = export_category(&store, "cats", &dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AnnotatorError::Io { .. }));
    }
}
