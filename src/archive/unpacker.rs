use crate::archive::ArchiveProgress;
use crate::config::ArchiveConfig;
use crate::error::{CrackError, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnpackSummary {
    pub entries: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Extracts a zip package into a working tree, enforcing size, count and
/// path limits on every entry.
pub struct Unpacker {
    max_entry_size: u64,
    max_total_size: u64,
    max_entries: usize,
}

impl Unpacker {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            max_entry_size: config.max_entry_size,
            max_total_size: config.max_total_size,
            max_entries: config.max_entries,
        }
    }

    /// Extracts every entry of `archive_path` below `tree`, then deletes the archive file.
    pub fn unpack(
        &self,
        archive_path: &Path,
        tree: &Path,
        progress_callback: Option<&dyn Fn(&ArchiveProgress)>,
    ) -> Result<UnpackSummary> {
        let summary = self.extract_all(archive_path, tree, progress_callback)?;

        fs::remove_file(archive_path)?;
        debug!("removed unpacked archive {}", archive_path.display());

        Ok(summary)
    }

    fn extract_all(
        &self,
        archive_path: &Path,
        tree: &Path,
        progress_callback: Option<&dyn Fn(&ArchiveProgress)>,
    ) -> Result<UnpackSummary> {
        let file = fs::File::open(archive_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        if archive.len() > self.max_entries {
            return Err(CrackError::TooManyEntries {
                count: archive.len(),
                max_entries: self.max_entries,
            });
        }

        let mut progress = ArchiveProgress::new(archive.len());
        let mut summary = UnpackSummary::default();
        let mut declared_total = 0u64;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();

            let relative = entry
                .enclosed_name()
                .and_then(|p| safe_relative_path(&p))
                .ok_or_else(|| CrackError::UnsafeEntryPath { name: name.clone() })?;

            if entry.size() > self.max_entry_size {
                return Err(CrackError::EntryTooLarge {
                    name,
                    size: entry.size(),
                    max_size: self.max_entry_size,
                });
            }

            declared_total = declared_total.saturating_add(entry.size());
            if declared_total > self.max_total_size {
                return Err(CrackError::ArchiveTooLarge {
                    max_size: self.max_total_size,
                });
            }

            let dest = tree.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }

                let written = self.write_entry(&mut entry, &dest)?;
                if written > self.max_entry_size {
                    // Header understated the real size
                    return Err(CrackError::EntryTooLarge {
                        name,
                        size: written,
                        max_size: self.max_entry_size,
                    });
                }

                summary.files += 1;
                summary.bytes += written;
                if summary.bytes > self.max_total_size {
                    return Err(CrackError::ArchiveTooLarge {
                        max_size: self.max_total_size,
                    });
                }
            }

            summary.entries += 1;
            progress.update_entry(name);
            if let Some(callback) = progress_callback {
                callback(&progress);
            }
        }

        debug!(
            "extracted {} entries ({} bytes) into {}",
            summary.entries,
            summary.bytes,
            tree.display()
        );

        Ok(summary)
    }

    // Copies at most one byte past the limit so oversized entries are detected
    // without decompressing them fully.
    fn write_entry<R: Read>(&self, entry: &mut R, dest: &Path) -> Result<u64> {
        let mut writer = BufWriter::new(fs::File::create(dest)?);
        let mut limited = entry.take(self.max_entry_size.saturating_add(1));

        let written = io::copy(&mut limited, &mut writer)?;
        writer.flush()?;

        Ok(written)
    }
}

/// Accepts only paths made of plain components, so joining onto the working
/// tree can never leave it.
fn safe_relative_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}
