use crate::error::{CrackError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// A user-supplied spreadsheet package. Only ever read.
#[derive(Debug, Clone)]
pub struct SourcePackage {
    path: PathBuf,
    extension: String,
}

impl SourcePackage {
    /// Checks the extension only; existence is reported by the copy stage
    /// so that a missing file surfaces as an I/O error.
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_string())
            .ok_or_else(|| CrackError::UnsupportedExtension { path: path.clone() })?;

        if !SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            return Err(CrackError::UnsupportedExtension { path });
        }

        if path.file_stem().map_or(true, |stem| stem.is_empty()) {
            return Err(CrackError::UnsupportedExtension { path });
        }

        Ok(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn output_path(&self, marker: &str) -> PathBuf {
        derive_output_path(&self.path, marker)
    }
}

/// `report.xlsx` with marker `cracked` becomes `report.cracked.xlsx`, next to the source.
pub fn derive_output_path(source: &Path, marker: &str) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default();

    let mut file_name = OsString::from(stem);
    file_name.push(".");
    file_name.push(marker);

    if let Some(extension) = source.extension() {
        file_name.push(".");
        file_name.push(extension);
    }

    source.with_file_name(file_name)
}
