pub mod repacker;
pub mod unpacker;
pub mod working_tree;

pub use repacker::{RepackSummary, Repacker};
pub use unpacker::{UnpackSummary, Unpacker};
pub use working_tree::WorkingTree;

/// Per-entry progress reported by the unpack and repack stages.
#[derive(Debug, Clone)]
pub struct ArchiveProgress {
    pub entries_processed: usize,
    pub total_entries: usize,
    pub current_entry: Option<String>,
}

impl ArchiveProgress {
    pub fn new(total_entries: usize) -> Self {
        Self {
            entries_processed: 0,
            total_entries,
            current_entry: None,
        }
    }

    pub fn update_entry<S: Into<String>>(&mut self, name: S) {
        self.entries_processed += 1;
        self.current_entry = Some(name.into());
    }
}
