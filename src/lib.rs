pub mod archive;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod package;
pub mod ui;

#[cfg(test)]
mod test_support;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{ArchiveConfig, CliOverrides, Config, EditConfig, OutputConfig};
pub use error::{CrackError, ErrorKind, Result, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveProgress, RepackSummary, Repacker, UnpackSummary, Unpacker, WorkingTree};
pub use editor::{inspect_package, EditSummary, Editor, PackageInspection, ProtectionMarker};
pub use package::{copy_package, derive_output_path, SourcePackage};
pub use ui::{OutputFormatter, OutputMode, ProgressManager, StageProgress};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use ui::progress::update_entry_progress;

/// Outcome of one successful run.
#[derive(Debug, Clone, Serialize)]
pub struct CrackReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub bytes_copied: u64,
    pub unpacked: UnpackSummary,
    pub edits: EditSummary,
    pub repacked: RepackSummary,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Where a run reads from and writes to, resolved before anything is touched.
#[derive(Debug, Clone)]
pub struct CrackPlan {
    pub source: SourcePackage,
    pub output: PathBuf,
}

/// Drives the copy, unpack, edit and repack stages for one package.
pub struct Cracker {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl Cracker {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager =
            ProgressManager::new(!quiet && verbose > 0 && output_mode == OutputMode::Human);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    /// Create a Cracker from parsed CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;

        Ok(Self::new(
            config,
            cli_args.output_mode(),
            cli_args.verbose,
            cli_args.quiet,
        ))
    }

    /// Validates the source and derives the output path. Touches no files.
    pub fn plan(&self, source: &Path, output_override: Option<&Path>) -> Result<CrackPlan> {
        let source = SourcePackage::new(source)?;
        let output = match output_override {
            Some(path) => path.to_path_buf(),
            None => source.output_path(&self.config.output.marker),
        };

        if refers_to_source(source.path(), &output) {
            return Err(CrackError::usage(format!(
                "output path {} would overwrite the source package",
                output.display()
            )));
        }

        Ok(CrackPlan { source, output })
    }

    /// Writes an unprotected copy of `source` and returns what was done.
    ///
    /// The source package is only ever read. On failure the partial output
    /// and the working tree are removed unless `keep_partial` is set.
    pub fn crack(&self, source: &Path, output_override: Option<&Path>) -> Result<CrackReport> {
        let start_time = Instant::now();
        let plan = self.plan(source, output_override)?;
        let output = plan.output.as_path();

        self.output_formatter.start_operation(&format!(
            "Removing protection from {}",
            plan.source.path().display()
        ));

        let bytes_copied = match self.copy_stage(&plan) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.discard_output(output);
                return Err(e);
            }
        };

        let tree = match WorkingTree::create_beside(output) {
            Ok(tree) => tree,
            Err(e) => {
                self.discard_output(output);
                return Err(e);
            }
        };

        match self.transform_stages(output, tree.path()) {
            Ok((unpacked, edits, repacked)) => {
                tree.close()?;

                let report = CrackReport {
                    source: plan.source.path().to_path_buf(),
                    output: plan.output.clone(),
                    bytes_copied,
                    unpacked,
                    edits,
                    repacked,
                    duration_ms: start_time.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                };

                info!(
                    "cracked {} into {} in {}ms",
                    report.source.display(),
                    report.output.display(),
                    report.duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                self.progress_manager.clear();
                if self.config.output.keep_partial {
                    let kept = tree.keep();
                    self.output_formatter.warning(&format!(
                        "Keeping partial output {} and working tree {}",
                        output.display(),
                        kept.display()
                    ));
                } else {
                    if let Err(close_err) = tree.close() {
                        warn!("failed to remove working tree: {}", close_err);
                    }
                    self.discard_output(output);
                }
                Err(e)
            }
        }
    }

    /// Counts protection elements without writing anything.
    pub fn inspect(
        &self,
        source: &Path,
        output_override: Option<&Path>,
    ) -> Result<(CrackPlan, PackageInspection)> {
        let plan = self.plan(source, output_override)?;
        let inspection = inspect_package(
            plan.source.path(),
            &self.config.edit,
            &self.config.archive,
        )?;

        Ok((plan, inspection))
    }

    fn copy_stage(&self, plan: &CrackPlan) -> Result<u64> {
        let stage = StageProgress::spinner(&self.progress_manager, "Copying package");

        match copy_package(plan.source.path(), &plan.output) {
            Ok(bytes) => {
                stage.finish_success();
                debug!("copied {} bytes to {}", bytes, plan.output.display());
                Ok(bytes)
            }
            Err(e) => {
                stage.abandon(&e.to_string());
                Err(e)
            }
        }
    }

    fn transform_stages(
        &self,
        output: &Path,
        tree: &Path,
    ) -> Result<(UnpackSummary, EditSummary, RepackSummary)> {
        let unpacked = {
            let stage = StageProgress::entries(&self.progress_manager, "Unpacking");
            let callback = |progress: &ArchiveProgress| update_entry_progress(stage.bar(), progress);

            let result = Unpacker::new(&self.config.archive).unpack(output, tree, Some(&callback));
            finish_stage(&stage, result)?
        };
        info!("unpacked {} entries into {}", unpacked.entries, tree.display());

        let edits = {
            let stage = StageProgress::spinner(&self.progress_manager, "Removing protection");
            let callback = |entry: &str| stage.set_message(entry);

            let result = Editor::new(&self.config.edit).edit_tree(tree, Some(&callback));
            finish_stage(&stage, result)?
        };

        if edits.total_removed() == 0 {
            self.progress_manager
                .suspend(|| self.output_formatter.info("No protection elements found"));
        }

        let repacked = {
            let stage = StageProgress::entries(&self.progress_manager, "Repacking");
            let callback = |progress: &ArchiveProgress| update_entry_progress(stage.bar(), progress);

            let result = Repacker::new(&self.config.archive).repack(tree, output, Some(&callback));
            finish_stage(&stage, result)?
        };
        info!("repacked {} entries into {}", repacked.entries, output.display());

        Ok((unpacked, edits, repacked))
    }

    fn discard_output(&self, output: &Path) {
        match fs::remove_file(output) {
            Ok(()) => debug!("removed partial output {}", output.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove partial output {}: {}", output.display(), e),
        }
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        Config::default().save_to_file(output_path)
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }
}

fn finish_stage<T>(stage: &StageProgress, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            stage.finish_success();
            Ok(value)
        }
        Err(e) => {
            stage.abandon(&e.to_string());
            Err(e)
        }
    }
}

// A hard link to the source has a different path but the same inode
fn refers_to_source(source: &Path, output: &Path) -> bool {
    source == output || same_file::is_same_file(source, output).unwrap_or(false)
}
