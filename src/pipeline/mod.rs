pub mod batch;
pub mod report;
pub mod runner;

pub use batch::{ArchiveEntry, UploadBatch, UploadedArchive, WorkDir};
pub use report::{ArchiveReport, ArchiveState, BatchReport, RunStatus};
pub use runner::BatchPipeline;

use crate::archive::{OutputArchive, Repackager};
use crate::config::Config;
use crate::error::Result;
use crate::structure::StructureCodec;
use crate::ui::GracefulShutdown;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Result of a conversion run that was not aborted.
#[derive(Debug)]
pub struct ConversionRun {
    pub report: BatchReport,
    /// `None` when no archive completed, including the empty batch.
    pub archive: Option<OutputArchive>,
}

/// Converts a batch end to end: pipeline run, then packaging.
pub struct BatchConverter {
    config: Config,
    codec: Arc<dyn StructureCodec>,
    shutdown: Option<GracefulShutdown>,
    staging_dir: Option<PathBuf>,
}

impl BatchConverter {
    pub fn new(config: Config, codec: Arc<dyn StructureCodec>) -> Self {
        Self {
            config,
            codec,
            shutdown: None,
            staging_dir: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Directory for the temporary output archive.
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn convert_batch(
        &self,
        batch: &UploadBatch,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Result<ConversionRun> {
        let conversion = &self.config.conversion;

        if batch.is_empty() {
            let mut report = BatchReport::new(conversion.source_format, conversion.target_format);
            report.finish();
            return Ok(ConversionRun {
                report,
                archive: None,
            });
        }

        let workdir = WorkDir::create()?;
        let mut pipeline = BatchPipeline::new(&self.config, self.codec.clone());
        if let Some(shutdown) = &self.shutdown {
            pipeline = pipeline.with_shutdown(shutdown.clone());
        }

        let report = pipeline.run(batch, &workdir, on_progress)?;
        let entries = report.completed_entries(workdir.path());

        let archive = if entries.is_empty() {
            info!("no archive completed, skipping packaging");
            None
        } else {
            let mut repackager = Repackager::new(&self.config.packaging);
            if let Some(dir) = &self.staging_dir {
                repackager = repackager.with_staging_dir(dir);
            }
            let report_json = if repackager.includes_report() {
                Some(report.to_json()?)
            } else {
                None
            };
            let file_name = self.config.packaging.output_name.to_string_lossy();
            Some(repackager.pack(&entries, &file_name, report_json.as_deref())?)
        };

        workdir.close()?;
        Ok(ConversionRun { report, archive })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::build_zip;
    use crate::structure::fixtures::SAMPLE_CIF;
    use crate::structure::FormatCodec;

    fn converter(config: Config) -> BatchConverter {
        BatchConverter::new(config, Arc::new(FormatCodec::default()))
    }

    fn sorted(entries: &[String]) -> Vec<String> {
        let mut entries = entries.to_vec();
        entries.sort();
        entries
    }

    #[test]
    fn test_empty_batch_produces_no_archive() {
        let run = converter(Config::default())
            .convert_batch(&UploadBatch::default(), &mut |_, _| panic!("no progress expected"))
            .unwrap();

        assert!(run.report.is_empty());
        assert!(run.archive.is_none());
    }

    #[test]
    fn test_two_archive_scenario() {
        let batch = UploadBatch::new(vec![
            UploadedArchive::new("A.zip", build_zip(&[("x.cif", SAMPLE_CIF)])),
            UploadedArchive::new(
                "B.zip",
                build_zip(&[("y.cif", SAMPLE_CIF), ("z.txt", "notes")]),
            ),
        ]);

        let run = converter(Config::default())
            .convert_batch(&batch, &mut |_, _| {})
            .unwrap();

        assert_eq!(run.report.converted_files(), 2);
        assert_eq!(run.report.status(), RunStatus::Succeeded);
        let archive = run.archive.unwrap();
        assert_eq!(
            sorted(archive.entries()),
            vec!["A/x.cif", "A/x.pdb", "B/y.cif", "B/y.pdb", "B/z.txt"]
        );
        assert_eq!(archive.file_name(), "converted_files.zip");
    }

    #[test]
    fn test_replacing_originals() {
        let mut config = Config::default();
        config.conversion.retain_originals = false;
        let batch = UploadBatch::new(vec![UploadedArchive::new(
            "A.zip",
            build_zip(&[("x.cif", SAMPLE_CIF)]),
        )]);

        let run = converter(config).convert_batch(&batch, &mut |_, _| {}).unwrap();

        assert_eq!(run.archive.unwrap().entries(), &["A/x.pdb"]);
    }

    #[test]
    fn test_runs_are_repeatable() {
        let batch = UploadBatch::new(vec![
            UploadedArchive::new("A.zip", build_zip(&[("x.cif", SAMPLE_CIF), ("b/n.txt", "n")])),
            UploadedArchive::new("A.zip", build_zip(&[("y.cif", SAMPLE_CIF)])),
            UploadedArchive::new("C.zip", build_zip(&[])),
        ]);
        let converter = converter(Config::default());

        let first = converter.convert_batch(&batch, &mut |_, _| {}).unwrap();
        let second = converter.convert_batch(&batch, &mut |_, _| {}).unwrap();

        let first_entries = first.archive.unwrap().entries().to_vec();
        assert_eq!(first_entries, second.archive.unwrap().entries());
        assert_eq!(
            first_entries,
            vec!["A/b/n.txt", "A/x.cif", "A/x.pdb", "A (2)/y.cif", "A (2)/y.pdb", "C/"]
        );
    }

    #[test]
    fn test_all_archives_failed() {
        let batch = UploadBatch::new(vec![UploadedArchive::new("bad.zip", b"nope".to_vec())]);
        let run = converter(Config::default())
            .convert_batch(&batch, &mut |_, _| {})
            .unwrap();

        assert!(run.archive.is_none());
        assert_eq!(
            run.report.status(),
            RunStatus::SucceededWithSkips {
                skipped_files: 0,
                failed_archives: 1
            }
        );
    }
}
