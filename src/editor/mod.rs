pub mod inspect;
pub mod protection;

pub use inspect::{inspect_package, EntryFinding, PackageInspection};
pub use protection::ProtectionMarker;

use crate::config::EditConfig;
use crate::error::{CrackError, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// `sheet1.xml`, `sheet12.xml`, `sheet0.xml`; never `sheet01.xml`.
pub fn is_sheet_entry(file_name: &str) -> bool {
    static SHEET_NAME: OnceLock<Regex> = OnceLock::new();

    SHEET_NAME
        .get_or_init(|| {
            Regex::new(r"^sheet(0|[1-9][0-9]*)\.xml$").expect("sheet name pattern is a valid regex")
        })
        .is_match(file_name)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditSummary {
    pub workbook_elements_removed: usize,
    pub sheets_scanned: usize,
    pub sheet_elements_removed: usize,
    pub unlocked_sheets: Vec<String>,
}

impl EditSummary {
    pub fn total_removed(&self) -> usize {
        self.workbook_elements_removed + self.sheet_elements_removed
    }
}

/// Removes protection elements from the manifest and sheet parts of an
/// unpacked package.
pub struct Editor {
    manifest_path: PathBuf,
    worksheets_dir: PathBuf,
}

impl Editor {
    pub fn new(config: &EditConfig) -> Self {
        Self {
            manifest_path: config.manifest_path(),
            worksheets_dir: config.worksheets_dir(),
        }
    }

    pub fn edit_tree(
        &self,
        tree: &Path,
        progress_callback: Option<&dyn Fn(&str)>,
    ) -> Result<EditSummary> {
        let mut summary = EditSummary::default();

        let manifest = tree.join(&self.manifest_path);
        if !manifest.is_file() {
            return Err(CrackError::MissingEntry {
                name: self.manifest_path.display().to_string(),
            });
        }

        summary.workbook_elements_removed = strip_file(&manifest, ProtectionMarker::Workbook)?;
        if let Some(callback) = progress_callback {
            callback(&self.manifest_path.display().to_string());
        }

        for sheet in self.sheet_entries(tree)? {
            let name = sheet
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let removed = strip_file(&sheet, ProtectionMarker::Sheet)?;
            summary.sheets_scanned += 1;

            if removed > 0 {
                summary.sheet_elements_removed += removed;
                summary.unlocked_sheets.push(name.clone());
            }

            if let Some(callback) = progress_callback {
                callback(&name);
            }
        }

        info!(
            "removed {} workbook and {} sheet protection elements ({} sheets scanned)",
            summary.workbook_elements_removed,
            summary.sheet_elements_removed,
            summary.sheets_scanned
        );

        Ok(summary)
    }

    /// Sheet parts directly inside the worksheets directory, sorted by file name.
    fn sheet_entries(&self, tree: &Path) -> Result<Vec<PathBuf>> {
        let dir = tree.join(&self.worksheets_dir);
        if !dir.is_dir() {
            return Err(CrackError::MissingEntry {
                name: self.worksheets_dir.display().to_string(),
            });
        }

        let mut sheets = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            match file_name.to_str() {
                Some(name) if is_sheet_entry(name) => sheets.push(entry.path()),
                _ => debug!("skipping {}", entry.path().display()),
            }
        }

        sheets.sort();
        Ok(sheets)
    }
}

/// Rewrites `path` without any `marker` elements. Returns how many were removed.
pub fn strip_file(path: &Path, marker: ProtectionMarker) -> Result<usize> {
    let content = fs::read_to_string(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
    })?;

    let removed = marker.count(&content);
    if removed > 0 {
        let stripped = marker.strip(&content);
        fs::write(path, stripped.as_bytes())?;
        debug!(
            "removed {} <{}> element(s) from {}",
            removed,
            marker.element_name(),
            path.display()
        );
    }

    Ok(removed)
}
