use crate::archive::ArchiveProgress;
use crate::config::ArchiveConfig;
use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepackSummary {
    pub entries: usize,
    pub bytes: u64,
    pub archive_size: u64,
}

#[derive(Debug)]
enum TreeEntry {
    File { name: String, path: PathBuf, size: u64 },
    EmptyDir { name: String },
}

impl TreeEntry {
    fn name(&self) -> &str {
        match self {
            TreeEntry::File { name, .. } | TreeEntry::EmptyDir { name } => name,
        }
    }
}

/// Compresses a working tree into a single zip archive.
///
/// Entries are written in byte order of their `/`-separated relative path
/// with a fixed timestamp, so the same tree always yields the same bytes.
pub struct Repacker {
    compression_level: i64,
}

impl Repacker {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            compression_level: config.compression_level,
        }
    }

    pub fn repack(
        &self,
        tree: &Path,
        dest: &Path,
        progress_callback: Option<&dyn Fn(&ArchiveProgress)>,
    ) -> Result<RepackSummary> {
        let entries = collect_entries(tree)?;
        let mut progress = ArchiveProgress::new(entries.len());
        let mut summary = RepackSummary::default();

        let file = fs::File::create(dest)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        for entry in &entries {
            match entry {
                TreeEntry::File { name, path, size } => {
                    let options = self.file_options().large_file(*size >= u32::MAX as u64);
                    zip.start_file(name.as_str(), options)?;

                    let mut reader = BufReader::new(fs::File::open(path)?);
                    summary.bytes += io::copy(&mut reader, &mut zip)?;
                }
                TreeEntry::EmptyDir { name } => {
                    zip.add_directory(name.as_str(), self.file_options())?;
                }
            }

            summary.entries += 1;
            progress.update_entry(entry.name());
            if let Some(callback) = progress_callback {
                callback(&progress);
            }
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        drop(writer);

        summary.archive_size = fs::metadata(dest)?.len();
        debug!(
            "wrote {} entries ({} bytes, {} compressed) to {}",
            summary.entries,
            summary.bytes,
            summary.archive_size,
            dest.display()
        );

        Ok(summary)
    }

    fn file_options(&self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        if self.compression_level == 0 {
            options.compression_method(CompressionMethod::Stored)
        } else {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.compression_level))
        }
    }
}

fn collect_entries(tree: &Path) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(tree).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(tree).map_err(|e| {
            anyhow::anyhow!("{} is outside {}: {}", entry.path().display(), tree.display(), e)
        })?;
        let name = archive_name(relative);
        let file_type = entry.file_type();

        if file_type.is_file() {
            entries.push(TreeEntry::File {
                name,
                path: entry.path().to_path_buf(),
                size: entry.metadata()?.len(),
            });
        } else if file_type.is_dir() {
            if fs::read_dir(entry.path())?.next().is_none() {
                entries.push(TreeEntry::EmptyDir {
                    name: format!("{}/", name),
                });
            }
        } else {
            warn!("skipping non-regular file {}", entry.path().display());
        }
    }

    entries.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(entries)
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
