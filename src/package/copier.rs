use crate::error::Result;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

const BUFFER_SIZE: usize = 64 * 1024;

/// Copies `source` to `dest` byte for byte, overwriting `dest`, then carries
/// over permissions and access/modification times. Returns the bytes copied.
pub fn copy_package(source: &Path, dest: &Path) -> Result<u64> {
    let source_file = fs::File::open(source).map_err(|e| with_path(e, source))?;
    let metadata = source_file.metadata()?;

    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Source is not a file: {}", source.display()),
        )
        .into());
    }

    let dest_file = fs::File::create(dest).map_err(|e| with_path(e, dest))?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

    let total_bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    drop(writer);

    fs::set_permissions(dest, metadata.permissions())?;

    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        // Not every filesystem supports setting times
        debug!("could not preserve timestamps on {}: {}", dest.display(), e);
    }

    debug!(
        "copied {} -> {} ({} bytes)",
        source.display(),
        dest.display(),
        total_bytes
    );

    Ok(total_bytes)
}

fn with_path(error: io::Error, path: &Path) -> io::Error {
    io::Error::new(error.kind(), format!("{}: {}", path.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrackError;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_copy_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("book.xlsx");
        let dest = temp_dir.path().join("book.cracked.xlsx");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &content).unwrap();

        let copied = copy_package(&source, &dest).unwrap();

        assert_eq!(copied, content.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), content);
        assert_eq!(fs::read(&source).unwrap(), content);
    }

    #[test]
    fn test_copy_preserves_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("book.xlsx");
        let dest = temp_dir.path().join("book.cracked.xlsx");
        fs::write(&source, b"data").unwrap();

        let past = SystemTime::now() - Duration::from_secs(86_400);
        filetime::set_file_mtime(&source, filetime::FileTime::from_system_time(past)).unwrap();

        copy_package(&source, &dest).unwrap();

        let source_mtime = fs::metadata(&source).unwrap().modified().unwrap();
        let dest_mtime = fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(source_mtime, dest_mtime);
    }

    #[test]
    fn test_copy_overwrites_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("book.xlsx");
        let dest = temp_dir.path().join("book.cracked.xlsx");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"stale content that is longer").unwrap();

        copy_package(&source, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("missing.xlsx");
        let dest = temp_dir.path().join("missing.cracked.xlsx");

        let result = copy_package(&source, &dest);

        assert!(matches!(result, Err(CrackError::Io(_))));
        assert!(!dest.exists());
    }
}
