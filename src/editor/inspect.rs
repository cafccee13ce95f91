use crate::config::{ArchiveConfig, EditConfig};
use crate::editor::{is_sheet_entry, ProtectionMarker};
use crate::error::{CrackError, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Clone, Serialize)]
pub struct EntryFinding {
    pub entry: String,
    pub element: &'static str,
    pub occurrences: usize,
}

/// What a run would remove, gathered without writing anything.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageInspection {
    pub entries: usize,
    pub sheets: usize,
    pub findings: Vec<EntryFinding>,
}

impl PackageInspection {
    pub fn is_protected(&self) -> bool {
        self.findings.iter().any(|f| f.occurrences > 0)
    }

    pub fn total_occurrences(&self) -> usize {
        self.findings.iter().map(|f| f.occurrences).sum()
    }
}

/// Reads the manifest and sheet parts straight from the package and counts
/// protection elements in each.
pub fn inspect_package(
    package: &Path,
    edit: &EditConfig,
    limits: &ArchiveConfig,
) -> Result<PackageInspection> {
    let file = fs::File::open(package)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    if archive.len() > limits.max_entries {
        return Err(CrackError::TooManyEntries {
            count: archive.len(),
            max_entries: limits.max_entries,
        });
    }

    let manifest_name = edit.manifest_path.trim_matches('/').to_string();
    let sheet_prefix = format!("{}/", edit.worksheets_dir.trim_matches('/'));

    let mut sheet_names: Vec<String> = archive
        .file_names()
        .filter(|name| {
            name.strip_prefix(&sheet_prefix)
                .is_some_and(|rest| !rest.contains('/') && is_sheet_entry(rest))
        })
        .map(|name| name.to_string())
        .collect();
    sheet_names.sort();

    let mut inspection = PackageInspection {
        entries: archive.len(),
        sheets: sheet_names.len(),
        findings: Vec::new(),
    };

    let manifest = read_entry(&mut archive, &manifest_name, limits.max_entry_size)?;
    inspection.findings.push(EntryFinding {
        entry: manifest_name,
        element: ProtectionMarker::Workbook.element_name(),
        occurrences: ProtectionMarker::Workbook.count(&manifest),
    });

    // Any entry below the prefix creates the directory on extraction
    if !archive.file_names().any(|name| name.starts_with(&sheet_prefix)) {
        return Err(CrackError::MissingEntry {
            name: edit.worksheets_dir.trim_matches('/').to_string(),
        });
    }

    for name in sheet_names {
        let content = read_entry(&mut archive, &name, limits.max_entry_size)?;
        inspection.findings.push(EntryFinding {
            element: ProtectionMarker::Sheet.element_name(),
            occurrences: ProtectionMarker::Sheet.count(&content),
            entry: name,
        });
    }

    Ok(inspection)
}

fn read_entry<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_size: u64,
) -> Result<String> {
    let entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => CrackError::MissingEntry {
            name: name.to_string(),
        },
        other => other.into(),
    })?;

    if entry.size() > max_size {
        return Err(CrackError::EntryTooLarge {
            name: name.to_string(),
            size: entry.size(),
            max_size,
        });
    }

    let mut content = String::new();
    entry.take(max_size).read_to_string(&mut content)?;
    Ok(content)
}
