use crate::editor::PackageInspection;
use crate::error::{CrackError, ErrorKind, UserFriendlyError};
use crate::CrackReport;
use console::{style, Emoji, Term};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static INFO: Emoji = Emoji("ℹ️  ", "");
static WARNING: Emoji = Emoji("⚠️  ", "");
static LOCK: Emoji = Emoji("🔓 ", "");

/// Program name used as the prefix of notice and error lines.
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
    program: String,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
            program: program_name(),
        }
    }

    pub fn verbose_level(&self) -> u8 {
        self.verbose_level
    }

    /// The single line printed on success.
    pub fn notice(&self, report: &CrackReport) {
        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "notice",
                "output": report.output,
                "report": report,
            })),
            _ => println!(
                "{}: notice: cracked file is {}",
                self.program,
                report.output.display()
            ),
        }
    }

    /// The single categorized line printed on a handled failure.
    pub fn failure(&self, error: &CrackError) {
        let kind = error.kind();
        let message = error.user_message();

        match self.mode {
            OutputMode::Json => eprintln!(
                "{}",
                serde_json::json!({
                    "type": "error",
                    "kind": kind.as_str(),
                    "message": message,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })
            ),
            _ => {
                let line = format!(
                    "{}: error: type: {}; message: {}",
                    self.program, kind, message
                );
                if self.use_colors && Term::stderr().features().colors_supported() {
                    eprintln!("{}", style(line).red().bold());
                } else {
                    eprintln!("{}", line);
                }
            }
        }

        if kind != ErrorKind::Unexpected {
            if let Some(suggestion) = error.suggestion() {
                self.hint(&suggestion);
            }
        }
    }

    /// Full diagnostic for failures nobody anticipated.
    pub fn unexpected(&self, error: &anyhow::Error) {
        eprintln!(
            "{}: error: unknown error, see diagnostic below\n",
            self.program
        );
        eprintln!("{:?}", error);
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => eprintln!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", LOCK, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_report(&self, report: &CrackReport) {
        if !self.should_show_message(1) || self.mode == OutputMode::Json {
            return;
        }

        let unlocked = if report.edits.unlocked_sheets.is_empty() {
            "none".to_string()
        } else {
            report.edits.unlocked_sheets.join(", ")
        };

        let rows = [
            ("Source", report.source.display().to_string()),
            ("Output", report.output.display().to_string()),
            ("Entries", report.unpacked.entries.to_string()),
            ("Unpacked", format_bytes(report.unpacked.bytes)),
            ("Archive size", format_bytes(report.repacked.archive_size)),
            (
                "Workbook locks removed",
                report.edits.workbook_elements_removed.to_string(),
            ),
            ("Sheets scanned", report.edits.sheets_scanned.to_string()),
            ("Sheets unlocked", unlocked),
            ("Time taken", format_duration(Duration::from_millis(report.duration_ms))),
        ];

        match self.mode {
            OutputMode::Human => {
                self.print_separator();
                for (label, value) in rows {
                    if self.use_colors {
                        println!("  {:<24}{}", format!("{}:", label), style(value).cyan().bold());
                    } else {
                        println!("  {:<24}{}", format!("{}:", label), value);
                    }
                }
                self.print_separator();
            }
            _ => {
                for (label, value) in rows {
                    println!("{}: {}", label, value);
                }
            }
        }
    }

    pub fn print_inspection(&self, source: &Path, output: &Path, inspection: &PackageInspection) {
        if self.mode == OutputMode::Json {
            self.print_json_object(&serde_json::json!({
                "type": "dry_run",
                "source": source,
                "output": output,
                "protected": inspection.is_protected(),
                "inspection": inspection,
            }));
            return;
        }

        println!("{}: dry run: {}", self.program, source.display());
        println!("  Would write: {}", output.display());
        println!(
            "  Entries: {}, sheets: {}",
            inspection.entries, inspection.sheets
        );

        for finding in &inspection.findings {
            if finding.occurrences > 0 || self.verbose_level > 0 {
                println!(
                    "  {}: {} <{}> element(s)",
                    finding.entry, finding.occurrences, finding.element
                );
            }
        }

        if !inspection.is_protected() {
            println!("  No protection elements found");
        }
    }

    fn hint(&self, suggestion: &str) {
        if !self.should_show_message(1) || self.mode == OutputMode::Json {
            return;
        }

        if self.use_colors {
            eprintln!("{}{}", INFO, style(format!("Suggestion: {}", suggestion)).cyan());
        } else {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    fn print_separator(&self) {
        if self.use_colors {
            println!("{}", style("─".repeat(60)).dim());
        } else {
            println!("{}", "-".repeat(60));
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            match msg_type {
                MessageType::Warning => eprintln!("{}{}", WARNING, style(message).yellow().bold()),
                MessageType::Info => println!("{}{}", INFO, style(message).cyan()),
            }
        } else {
            match msg_type {
                MessageType::Warning => eprintln!("! {}", message),
                MessageType::Info => println!("i {}", message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Warning,
    Info,
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    crate::error::format_bytes(bytes)
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level(), 0);
        assert!(!formatter.should_show_message(0));
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_program_name_is_not_empty() {
        assert!(!program_name().is_empty());
    }
}
