use crate::archive::ArchiveExtractor;
use crate::config::Config;
use crate::converter::FileConverter;
use crate::error::{ConvertError, ErrorScope, Result};
use crate::pipeline::batch::{UploadBatch, UploadedArchive, WorkDir};
use crate::pipeline::report::{ArchiveReport, ArchiveState, BatchReport};
use crate::scanner::StructureScanner;
use crate::structure::{StructureCodec, StructureFormat};
use crate::ui::GracefulShutdown;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Runs extraction, scanning and conversion over every archive of a batch.
pub struct BatchPipeline {
    extractor: ArchiveExtractor,
    scanner: StructureScanner,
    converter: FileConverter,
    source_format: StructureFormat,
    target_format: StructureFormat,
    shutdown: Option<GracefulShutdown>,
}

impl BatchPipeline {
    pub fn new(config: &Config, codec: Arc<dyn StructureCodec>) -> Self {
        Self {
            extractor: ArchiveExtractor::new(&config.extraction),
            scanner: StructureScanner::new(&config.conversion),
            converter: FileConverter::new(codec)
                .with_retain_originals(config.conversion.retain_originals),
            source_format: config.conversion.source_format,
            target_format: config.conversion.target_format,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Process `batch` in arrival order inside `workdir`.
    ///
    /// `on_progress(completed, total)` is called exactly once per archive,
    /// after that archive reaches `Done` or `Failed`. File and archive
    /// failures are recorded in the report; only run-level failures and
    /// cancellation return an error.
    pub fn run(
        &self,
        batch: &UploadBatch,
        workdir: &WorkDir,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Result<BatchReport> {
        let total = batch.len();
        let mut report = BatchReport::new(self.source_format, self.target_format);

        for (index, (upload, entry_name)) in batch
            .archives()
            .iter()
            .zip(batch.entry_names())
            .enumerate()
        {
            if let Some(shutdown) = &self.shutdown {
                shutdown.check_shutdown()?;
            }

            let _span = info_span!("archive", name = %upload.name, entry = %entry_name).entered();
            let dir = workdir.entry_dir(&entry_name);
            let mut archive_report = ArchiveReport::new(upload.name.clone(), entry_name);

            match self.process_archive(upload, &dir, &mut archive_report) {
                Ok(()) => {
                    archive_report.advance(ArchiveState::Done);
                    info!(
                        converted = archive_report.converted_count(),
                        skipped = archive_report.failed_count(),
                        "archive done"
                    );
                }
                Err(e) if e.scope() == ErrorScope::Run => return Err(e),
                Err(e) => {
                    warn!(error = %e, stage = %archive_report.state, "archive failed");
                    archive_report.fail(&e);
                    discard_partial_output(&dir)?;
                }
            }

            report.archives.push(archive_report);
            on_progress(index + 1, total);
        }

        report.finish();
        Ok(report)
    }

    fn process_archive(
        &self,
        upload: &UploadedArchive,
        dir: &Path,
        report: &mut ArchiveReport,
    ) -> Result<()> {
        report.advance(ArchiveState::Extracting);
        let tree = self.extractor.extract(&upload.name, &upload.bytes, dir)?;
        info!(files = tree.files.len(), bytes = tree.bytes_written, "extracted");

        report.advance(ArchiveState::Scanning);
        let files = self.scanner.scan_directory(dir)?;

        report.advance(ArchiveState::Converting);
        report.files = self.converter.convert_all(&files);
        Ok(())
    }
}

fn discard_partial_output(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConvertError::file_system(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::build_zip;
    use crate::structure::fixtures::{MALFORMED_CIF, SAMPLE_CIF};
    use crate::structure::FormatCodec;

    fn pipeline() -> BatchPipeline {
        BatchPipeline::new(&Config::default(), Arc::new(FormatCodec::default()))
    }

    fn upload(name: &str, entries: &[(&str, &str)]) -> UploadedArchive {
        UploadedArchive::new(name, build_zip(entries))
    }

    #[test]
    fn test_progress_is_monotonic_and_once_per_archive() {
        let batch = UploadBatch::new(vec![
            upload("A.zip", &[("x.cif", SAMPLE_CIF)]),
            UploadedArchive::new("broken.zip", b"not a zip".to_vec()),
            upload("C.zip", &[]),
        ]);
        let workdir = WorkDir::create().unwrap();
        let mut calls = Vec::new();

        pipeline()
            .run(&batch, &workdir, &mut |done, total| calls.push((done, total)))
            .unwrap();

        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_malformed_file_among_valid_ones() {
        let batch = UploadBatch::new(vec![upload(
            "A.zip",
            &[
                ("one.cif", SAMPLE_CIF),
                ("two.cif", MALFORMED_CIF),
                ("three.cif", SAMPLE_CIF),
            ],
        )]);
        let workdir = WorkDir::create().unwrap();

        let report = pipeline().run(&batch, &workdir, &mut |_, _| {}).unwrap();

        assert_eq!(report.converted_files(), 2);
        assert_eq!(report.skipped_files(), 1);
        assert_eq!(report.archives[0].state, ArchiveState::Done);
        assert!(workdir.entry_dir("A").join("one.pdb").exists());
        assert!(!workdir.entry_dir("A").join("two.pdb").exists());
    }

    #[test]
    fn test_unsafe_archive_fails_alone() {
        let batch = UploadBatch::new(vec![
            upload("evil.zip", &[("../../evil", "payload")]),
            upload("B.zip", &[("y.cif", SAMPLE_CIF)]),
        ]);
        let workdir = WorkDir::create().unwrap();

        let report = pipeline().run(&batch, &workdir, &mut |_, _| {}).unwrap();

        let evil = &report.archives[0];
        assert_eq!(evil.state, ArchiveState::Failed);
        assert_eq!(evil.failed_during, Some(ArchiveState::Extracting));
        assert_eq!(evil.error.as_ref().unwrap().kind, "unsafe_path");
        assert!(!workdir.entry_dir("evil").exists());

        assert_eq!(report.archives[1].state, ArchiveState::Done);
        assert_eq!(report.archives[1].converted_count(), 1);
        assert_eq!(report.failed_archives(), 1);
    }

    #[test]
    fn test_clashing_entries_fail_alone() {
        let batch = UploadBatch::new(vec![
            upload("clash.zip", &[("a", "file"), ("a/b.cif", SAMPLE_CIF)]),
            upload("B.zip", &[("y.cif", SAMPLE_CIF)]),
        ]);
        let workdir = WorkDir::create().unwrap();

        let report = pipeline().run(&batch, &workdir, &mut |_, _| {}).unwrap();

        assert_eq!(report.archives[0].state, ArchiveState::Failed);
        assert_eq!(report.archives[0].error.as_ref().unwrap().kind, "corrupt_archive");
        assert_eq!(report.archives[1].converted_count(), 1);
    }

    #[test]
    fn test_empty_archive_completes() {
        let batch = UploadBatch::new(vec![upload("C.zip", &[])]);
        let workdir = WorkDir::create().unwrap();

        let report = pipeline().run(&batch, &workdir, &mut |_, _| {}).unwrap();

        assert_eq!(report.archives[0].state, ArchiveState::Done);
        assert!(report.archives[0].files.is_empty());
        assert_eq!(report.status(), crate::pipeline::RunStatus::Succeeded);
    }

    #[test]
    fn test_cancellation_between_archives() {
        let shutdown = GracefulShutdown::new_for_test();
        let batch = UploadBatch::new(vec![
            upload("A.zip", &[("x.cif", SAMPLE_CIF)]),
            upload("B.zip", &[("y.cif", SAMPLE_CIF)]),
        ]);
        let workdir = WorkDir::create().unwrap();
        let pipeline = pipeline().with_shutdown(shutdown.clone());

        let mut calls = 0;
        let result = pipeline.run(&batch, &workdir, &mut |_, _| {
            calls += 1;
            shutdown.request_shutdown();
        });

        assert!(matches!(result, Err(ConvertError::Cancelled)));
        assert_eq!(calls, 1);
        assert!(!workdir.entry_dir("B").exists());
    }
}
