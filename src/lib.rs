pub mod archive;
pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod pipeline;
pub mod scanner;
pub mod structure;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Compression, Config, ConversionConfig, ExtractionConfig, PackagingConfig};
pub use error::{ConvertError, ErrorScope, Result, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveExtractor, OutputArchive, Repackager};
pub use converter::{ConversionResult, FileConverter};
pub use pipeline::{
    ArchiveEntry, ArchiveReport, ArchiveState, BatchConverter, BatchPipeline, BatchReport,
    ConversionRun, RunStatus, UploadBatch, UploadedArchive, WorkDir,
};
pub use scanner::{StructureFile, StructureScanner};
pub use structure::{FormatCodec, StructuralModel, StructureCodec, StructureFormat};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use scanner::StructureFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use ui::{DryRunCounts, DryRunEntry};

/// Outcome of [`Cif2Pdb::convert_archives`].
#[derive(Debug)]
pub struct ConversionOutcome {
    pub report: BatchReport,
    /// Where the output archive was written, if one was produced.
    pub output_path: Option<PathBuf>,
}

/// Main library interface for batch conversion
pub struct Cif2Pdb {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    force: bool,
}

impl Cif2Pdb {
    /// Create a new instance and install the Ctrl+C handler
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    /// Create an instance without a signal handler, for tests
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new_for_test(),
        )
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        // Progress bars would interleave with machine-readable output
        let show_progress = !quiet && output_mode == OutputMode::Human;

        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(show_progress),
            shutdown,
            force: false,
        }
    }

    /// Create an instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = OutputMode::from(&cli_args.output_format);

        Ok(Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)?.with_force(cli_args.force))
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Convert the archives at `paths` and write the combined output archive.
    pub async fn convert_archives(&self, paths: &[PathBuf]) -> Result<ConversionOutcome> {
        let start_time = Instant::now();
        let output_path = self.config.packaging.output_name.clone();

        if output_path.exists() && !self.force {
            return Err(ConvertError::OutputExists {
                path: output_path.display().to_string(),
            });
        }

        self.shutdown.check_shutdown()?;
        let batch = UploadBatch::from_paths(paths)?;
        self.output_formatter.start_operation(&format!(
            "Converting {} archive(s) from {} to {}",
            batch.len(),
            self.config.conversion.source_format,
            self.config.conversion.target_format
        ));

        let staging_dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let converter = BatchConverter::new(self.config.clone(), Arc::new(self.codec()))
            .with_shutdown(self.shutdown.clone())
            .with_staging_dir(staging_dir);

        let archive_progress = self.progress_manager.create_archive_progress(batch.len() as u64);
        let run = {
            let pb = archive_progress.clone();
            tokio::task::spawn_blocking(move || {
                converter.convert_batch(&batch, &mut |completed, total| {
                    ui::progress::update_archive_progress(&pb, completed, total);
                })
            })
            .await
            .map_err(|e| ConvertError::Packaging {
                message: format!("Conversion task failed: {}", e),
            })?
        };

        let run = match run {
            Ok(run) => run,
            Err(e) => {
                archive_progress.abandon();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &archive_progress,
            &format!("Processed {} archive(s)", run.report.archives.len()),
            start_time.elapsed(),
        );

        let written = match run.archive {
            Some(archive) => {
                let spinner = self.progress_manager.create_spinner("Writing output archive");
                let path = archive.persist(&output_path, self.force)?;
                spinner.finish_and_clear();
                Some(path)
            }
            None => {
                self.output_formatter
                    .warning("No archive completed; no output archive was written");
                None
            }
        };

        Ok(ConversionOutcome {
            report: run.report,
            output_path: written,
        })
    }

    /// Count convertible entries per archive without extracting anything.
    pub fn plan_conversion(&self, paths: &[PathBuf]) -> Result<Vec<DryRunEntry>> {
        let batch = UploadBatch::from_paths(paths)?;
        let extractor = ArchiveExtractor::new(&self.config.extraction);
        let filter = StructureFilter::new(self.config.conversion.source_format);
        let recursive = self.config.conversion.recursive_scan;

        let entries = batch
            .archives()
            .iter()
            .zip(batch.entry_names())
            .map(|(upload, entry_name)| {
                let outcome = extractor
                    .list_entries(&upload.name, &upload.bytes)
                    .map(|files| DryRunCounts {
                        total_entries: files.len(),
                        convertible: files
                            .iter()
                            .filter(|f| would_scan(&filter, f, recursive))
                            .count(),
                    })
                    .map_err(|e| e.user_message());
                DryRunEntry {
                    archive: upload.name.clone(),
                    entry_name,
                    outcome,
                }
            })
            .collect();

        Ok(entries)
    }

    fn codec(&self) -> FormatCodec {
        FormatCodec::new(
            self.config.conversion.source_format,
            self.config.conversion.target_format,
        )
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let path = output_path.as_ref();
        let sample_config = Config::create_sample_config();
        std::fs::write(path, sample_config).map_err(|e| ConvertError::file_system(path, e))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// Check if shutdown has been requested
    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// Request graceful shutdown
    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &ConvertError) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Whether the scanner would pick up `relative` inside an extracted tree.
fn would_scan(filter: &StructureFilter, relative: &Path, recursive: bool) -> bool {
    let dirs: Vec<_> = relative
        .parent()
        .map(|p| p.iter().collect())
        .unwrap_or_default();

    if !recursive && !dirs.is_empty() {
        return false;
    }

    dirs.iter()
        .all(|dir| filter.should_traverse_directory(Path::new(dir)))
        && filter.is_structure_file(relative)
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
        parallel: cfg!(feature = "parallel"),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
    pub parallel: bool,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cif2pdb {} ({}) built on {} for {}{}",
            self.version,
            self.git_hash,
            self.build_date,
            self.target,
            if self.parallel { " [parallel]" } else { "" }
        )
    }
}
