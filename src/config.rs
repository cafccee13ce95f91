use crate::error::{CrackError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub archive: ArchiveConfig,
    pub edit: EditConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Segment inserted before the extension of the cracked copy
    pub marker: String,
    /// Keep the working tree and partial output when a run fails
    pub keep_partial: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub max_entry_size: u64,
    pub max_total_size: u64,
    pub max_entries: usize,
    pub compression_level: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EditConfig {
    pub manifest_path: String,
    pub worksheets_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            marker: "cracked".to_string(),
            keep_partial: false,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_entry_size: 512 * 1024 * 1024, // 512MB
            max_total_size: 4 * 1024 * 1024 * 1024, // 4GB
            max_entries: 65_535,
            compression_level: 6,
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            manifest_path: "xl/workbook.xml".to_string(),
            worksheets_dir: "xl/worksheets".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CrackError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CrackError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| CrackError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["xlsxcrack.toml", ".xlsxcrack.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(max_size) = cli_args.max_entry_size {
            self.archive.max_entry_size = max_size;
        }

        if let Some(level) = cli_args.compression_level {
            self.archive.compression_level = level;
        }

        if cli_args.keep_partial {
            self.output.keep_partial = true;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| CrackError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| CrackError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let marker = self.output.marker.trim();
        if marker.is_empty() {
            return Err(CrackError::Config {
                message: "Output marker must not be empty".to_string(),
            });
        }

        if marker.contains(['/', '\\']) {
            return Err(CrackError::Config {
                message: format!("Output marker cannot contain path separators: {}", marker),
            });
        }

        if self.archive.max_entry_size == 0 || self.archive.max_total_size == 0 {
            return Err(CrackError::Config {
                message: "Archive size limits must be greater than 0".to_string(),
            });
        }

        if self.archive.max_entries == 0 {
            return Err(CrackError::Config {
                message: "Maximum entry count must be greater than 0".to_string(),
            });
        }

        if !(0..=9).contains(&self.archive.compression_level) {
            return Err(CrackError::Config {
                message: format!(
                    "Compression level must be between 0 and 9, got {}",
                    self.archive.compression_level
                ),
            });
        }

        if self.edit.manifest_path.is_empty() || self.edit.worksheets_dir.is_empty() {
            return Err(CrackError::Config {
                message: "Manifest path and worksheets directory must be set".to_string(),
            });
        }

        for entry in [&self.edit.manifest_path, &self.edit.worksheets_dir] {
            if entry.split(['/', '\\']).any(|segment| segment == "..") {
                return Err(CrackError::Config {
                    message: format!("Package entry paths cannot contain '..': {}", entry),
                });
            }
        }

        Ok(())
    }
}

impl EditConfig {
    pub fn manifest_path(&self) -> PathBuf {
        relative_entry_path(&self.manifest_path)
    }

    pub fn worksheets_dir(&self) -> PathBuf {
        relative_entry_path(&self.worksheets_dir)
    }
}

// Package entry names always use '/', regardless of platform
fn relative_entry_path(entry: &str) -> PathBuf {
    entry
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub max_entry_size: Option<u64>,
    pub compression_level: Option<i64>,
    pub keep_partial: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entry_size(mut self, max_size: Option<u64>) -> Self {
        self.max_entry_size = max_size;
        self
    }

    pub fn with_compression_level(mut self, level: Option<i64>) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_keep_partial(mut self, keep: bool) -> Self {
        self.keep_partial = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.marker, "cracked");
        assert!(!config.output.keep_partial);
        assert_eq!(config.edit.manifest_path, "xl/workbook.xml");
        assert_eq!(config.archive.compression_level, 6);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.output.marker = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.archive.compression_level = 12;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.marker = "a/b".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.edit.manifest_path = "../outside.xml".to_string();
        assert!(matches!(config.validate(), Err(CrackError::Config { .. })));

        let mut config = Config::default();
        config.edit.worksheets_dir = "xl/../../sheets".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.output.marker = "unlocked".to_string();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.output.marker, "unlocked");
        assert_eq!(
            loaded_config.archive.max_entry_size,
            config.archive.max_entry_size
        );
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[output]\nmarker = \"open\"\n\n[archive]\n\n[edit]").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.output.marker, "open");
        assert_eq!(config.archive.max_entries, 65_535);
        assert_eq!(config.edit.worksheets_dir, "xl/worksheets");
    }

    #[test]
    fn test_invalid_config_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[output\nmarker = ").unwrap();

        let result = Config::load_from_file(temp_file.path());
        assert!(matches!(result, Err(CrackError::Config { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_max_entry_size(Some(1024))
            .with_compression_level(Some(9))
            .with_keep_partial(true);

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.archive.max_entry_size, 1024);
        assert_eq!(config.archive.compression_level, 9);
        assert!(config.output.keep_partial);
    }

    #[test]
    fn test_entry_paths() {
        let config = EditConfig::default();
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("xl").join("workbook.xml")
        );
        assert_eq!(config.worksheets_dir(), PathBuf::from("xl").join("worksheets"));
    }
}
