use crate::config::{CliOverrides, Config};
use crate::error::{CrackError, Result};
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xlsxcrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Remove workbook and sheet protection from Excel packages")]
#[command(
    long_about = "xlsxcrack writes a copy of an .xlsx or .xlsm package with every \
                  workbookProtection and sheetProtection element removed. \
                  The source file is never modified."
)]
#[command(after_help = "EXAMPLES:\n  \
    xlsxcrack report.xlsx\n  \
    xlsxcrack budget.xlsm --output unlocked.xlsm -v\n  \
    xlsxcrack report.xlsx --dry-run\n  \
    xlsxcrack report.xlsx --config my-config.toml --output-format json")]
pub struct Cli {
    /// Path to the .xlsx or .xlsm package
    #[arg(required_unless_present = "generate_config")]
    pub file_name: Option<PathBuf>,

    /// Output path (defaults to <name>.cracked.<ext> next to the source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Keep the working tree and partial output when a run fails
    #[arg(long)]
    pub keep_partial: bool,

    /// Dry run (report what would be removed without writing anything)
    #[arg(long)]
    pub dry_run: bool,

    /// Largest uncompressed entry to accept (e.g. 512MB, 64k)
    #[arg(long, value_parser = parse_size_string)]
    pub max_entry_size: Option<u64>,

    /// Deflate level for the rebuilt package (0 stores entries uncompressed)
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=9))]
    pub compression_level: Option<i64>,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_max_entry_size(self.max_entry_size)
            .with_compression_level(self.compression_level)
            .with_keep_partial(self.keep_partial)
    }

    pub fn output_mode(&self) -> OutputMode {
        match self.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }

    /// The positional package path, which clap guarantees unless only a
    /// config file is being generated.
    pub fn source(&self) -> Result<&PathBuf> {
        self.file_name
            .as_ref()
            .ok_or_else(|| CrackError::usage("missing required argument: <FILE_NAME>"))
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Turns a clap parse failure into a single-line usage error, dropping the
/// usage and help footer.
pub fn usage_error(error: &clap::Error) -> CrackError {
    let rendered = error.to_string();
    let message = rendered
        .lines()
        .take_while(|line| {
            let line = line.trim();
            !line.starts_with("Usage:") && !line.starts_with("For more information")
        })
        .map(|line| line.trim().trim_start_matches("error: "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if message.is_empty() {
        CrackError::usage("invalid arguments")
    } else {
        CrackError::usage(message)
    }
}

pub fn parse_size_string(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().to_lowercase();

    let (number_str, multiplier) = if s.ends_with("kb") || s.ends_with('k') {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024)
    } else if s.ends_with("mb") || s.ends_with('m') {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with("gb") || s.ends_with('g') {
        (
            s.trim_end_matches("gb").trim_end_matches('g'),
            1024 * 1024 * 1024,
        )
    } else if s.ends_with('b') {
        (s.trim_end_matches('b'), 1)
    } else {
        (s.as_str(), 1)
    };

    let number: f64 = number_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number format: {}", number_str))?;

    if number < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    if number == 0.0 {
        return Err("Size must be greater than 0".to_string());
    }

    Ok((number * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_minimal_invocation() {
        let cli = Cli::try_parse_from(["xlsxcrack", "report.xlsx"]).unwrap();

        assert_eq!(cli.source().unwrap(), &PathBuf::from("report.xlsx"));
        assert_eq!(cli.output_mode(), OutputMode::Human);
        assert!(!cli.dry_run);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from([
            "xlsxcrack",
            "budget.xlsm",
            "--output",
            "open.xlsm",
            "--output-format",
            "json",
            "-vv",
            "--keep-partial",
            "--max-entry-size",
            "64MB",
            "--compression-level",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("open.xlsm")));
        assert_eq!(cli.output_mode(), OutputMode::Json);
        assert_eq!(cli.verbosity_level(), 2);

        let overrides = cli.create_cli_overrides();
        assert_eq!(overrides.max_entry_size, Some(64 * 1024 * 1024));
        assert_eq!(overrides.compression_level, Some(0));
        assert!(overrides.keep_partial);
    }

    #[test]
    fn test_file_name_required() {
        let err = Cli::try_parse_from(["xlsxcrack"]).unwrap_err();
        let usage = usage_error(&err);
        assert_eq!(usage.kind(), ErrorKind::Usage);
        assert!(usage.to_string().contains("FILE_NAME"));
        assert!(!usage.to_string().contains("Usage:"));

        let cli = Cli::try_parse_from(["xlsxcrack", "--generate-config"]).unwrap();
        assert!(cli.file_name.is_none());
        assert!(cli.source().is_err());
    }

    #[test]
    fn test_extra_argument_rejected() {
        assert!(Cli::try_parse_from(["xlsxcrack", "a.xlsx", "b.xlsx"]).is_err());
    }

    #[test]
    fn test_compression_level_range() {
        assert!(Cli::try_parse_from(["xlsxcrack", "a.xlsx", "--compression-level", "10"]).is_err());
    }

    #[test]
    fn test_usage_error_strips_prefix() {
        let err = Cli::try_parse_from(["xlsxcrack", "a.xlsx", "--bogus"]).unwrap_err();

        match usage_error(&err) {
            CrackError::Usage { message } => {
                assert!(!message.starts_with("error:"));
                assert!(message.contains("--bogus"));
            }
            other => panic!("expected usage error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_size_string() {
        assert_eq!(parse_size_string("10").unwrap(), 10);
        assert_eq!(parse_size_string("10KB").unwrap(), 10 * 1024);
        assert_eq!(parse_size_string("512k").unwrap(), 512 * 1024);
        assert_eq!(parse_size_string("5MB").unwrap(), 5 * 1024 * 1024);
        assert_eq!(parse_size_string("1GB").unwrap(), 1024 * 1024 * 1024);

        assert!(parse_size_string("invalid").is_err());
        assert!(parse_size_string("-5MB").is_err());
        assert!(parse_size_string("0").is_err());
    }
}
