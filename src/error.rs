use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum CrackError {
    #[error("{message}")]
    Usage { message: String },

    #[error("Unsupported file extension: {} (expected .xlsx or .xlsm)", path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File is not a zip file: {message}")]
    BadZip { message: String },

    #[error("Entry {name} is too large: {size} bytes (max: {max_size} bytes)")]
    EntryTooLarge {
        name: String,
        size: u64,
        max_size: u64,
    },

    #[error("Archive expands to more than {max_size} bytes")]
    ArchiveTooLarge { max_size: u64 },

    #[error("Archive has {count} entries (max: {max_entries})")]
    TooManyEntries { count: usize, max_entries: usize },

    #[error("Entry path escapes the working directory: {name}")]
    UnsafeEntryPath { name: String },

    #[error("No such entry in package: {name}")]
    MissingEntry { name: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Unexpected(#[from] anyhow::Error),
}

/// The closed set of failure categories reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Container,
    Io,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Usage => "usage",
            ErrorKind::Container => "container",
            ErrorKind::Io => "io",
            ErrorKind::Unexpected => "unexpected",
        }
    }

    /// Process exit status for this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Unexpected => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CrackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrackError::Usage { .. }
            | CrackError::UnsupportedExtension { .. }
            | CrackError::Config { .. } => ErrorKind::Usage,
            CrackError::BadZip { .. }
            | CrackError::EntryTooLarge { .. }
            | CrackError::ArchiveTooLarge { .. }
            | CrackError::TooManyEntries { .. }
            | CrackError::UnsafeEntryPath { .. }
            | CrackError::MissingEntry { .. } => ErrorKind::Container,
            CrackError::Io(_) => ErrorKind::Io,
            CrackError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn usage<S: Into<String>>(message: S) -> Self {
        CrackError::Usage {
            message: message.into(),
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for CrackError {
    fn user_message(&self) -> String {
        match self {
            CrackError::EntryTooLarge {
                name,
                size,
                max_size,
            } => {
                format!(
                    "Entry {} is too large: {} (maximum allowed: {})",
                    name,
                    format_bytes(*size),
                    format_bytes(*max_size)
                )
            }
            CrackError::ArchiveTooLarge { max_size } => {
                format!(
                    "Archive expands to more than {}",
                    format_bytes(*max_size)
                )
            }
            CrackError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => format!("File or directory not found: {}", e),
                std::io::ErrorKind::PermissionDenied => format!("Permission denied: {}", e),
                std::io::ErrorKind::InvalidData => format!("Invalid data: {}", e),
                _ => e.to_string(),
            },
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            CrackError::UnsupportedExtension { .. } => Some(
                "Only Office Open XML spreadsheets (.xlsx, .xlsm) are supported. Legacy .xls files must be re-saved first.".to_string()
            ),
            CrackError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate it with --generate-config.".to_string()
            ),
            CrackError::BadZip { .. } => Some(
                "The file may be encrypted with a password to open, or it is not a spreadsheet package. Encrypted workbooks cannot be unlocked.".to_string()
            ),
            CrackError::EntryTooLarge { .. } | CrackError::ArchiveTooLarge { .. } => Some(
                "Raise the limit with --max-entry-size or the [archive] section of the configuration file.".to_string()
            ),
            CrackError::MissingEntry { .. } => Some(
                "The package does not look like an Excel workbook.".to_string()
            ),
            CrackError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Some(
                "Ensure you have write permission for the directory containing the source file.".to_string()
            ),
            CrackError::Unexpected(_) => Some(
                "This is likely a bug. Please report it together with the diagnostic output.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<ZipError> for CrackError {
    fn from(error: ZipError) -> Self {
        match error {
            ZipError::Io(e) => CrackError::Io(e),
            ZipError::FileNotFound => CrackError::MissingEntry {
                name: "requested entry".to_string(),
            },
            other => CrackError::BadZip {
                message: other.to_string(),
            },
        }
    }
}

impl From<walkdir::Error> for CrackError {
    fn from(error: walkdir::Error) -> Self {
        if error.io_error().is_none() {
            // Only filesystem loops reach this branch
            return CrackError::Unexpected(
                anyhow::Error::new(error).context("directory walk failed"),
            );
        }

        match error.into_io_error() {
            Some(io) => CrackError::Io(io),
            None => CrackError::Unexpected(anyhow::anyhow!("directory walk failed")),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrackError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
