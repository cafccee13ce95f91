use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

const WORKING_TREE_PREFIX: &str = ".xlsx_crack_tmp";

/// Scratch directory holding a package's entries while they are edited.
///
/// Created next to the output package with a run-unique name, so concurrent
/// runs never share one. Dropping the tree removes it from disk.
#[derive(Debug)]
pub struct WorkingTree {
    dir: TempDir,
}

impl WorkingTree {
    pub fn create_beside(output: &Path) -> Result<Self> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let dir = Builder::new()
            .prefix(WORKING_TREE_PREFIX)
            .tempdir_in(parent)?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Leaves the directory on disk and returns its location.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Removes the directory, reporting any failure instead of ignoring it.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}
