//! Library-level batch conversion scenarios.

mod common;

use cif2pdb::archive::REPORT_ENTRY_NAME;
use cif2pdb::{
    ArchiveState, BatchConverter, Compression, Config, FormatCodec, RunStatus, StructureFormat,
    UploadBatch, UploadedArchive,
};
use common::{build_zip, read_zip_entry, zip_entry_names, MALFORMED_CIF, SAMPLE_CIF};
use std::sync::Arc;
use tempfile::TempDir;

fn converter(config: Config, staging: &TempDir) -> BatchConverter {
    let codec = FormatCodec::new(
        config.conversion.source_format,
        config.conversion.target_format,
    );
    BatchConverter::new(config, Arc::new(codec)).with_staging_dir(staging.path())
}

fn batch(archives: &[(&str, &[(&str, &str)])]) -> UploadBatch {
    UploadBatch::new(
        archives
            .iter()
            .map(|(name, entries)| UploadedArchive::new(*name, build_zip(entries)))
            .collect(),
    )
}

#[test]
fn unsafe_archive_does_not_affect_neighbours() {
    let staging = TempDir::new().unwrap();
    let uploads = batch(&[
        ("good.zip", &[("x.cif", SAMPLE_CIF)]),
        ("evil.zip", &[("ok.cif", SAMPLE_CIF), ("../escape.cif", SAMPLE_CIF)]),
    ]);

    let run = converter(Config::default(), &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();

    let evil = &run.report.archives[1];
    assert_eq!(evil.state, ArchiveState::Failed);
    assert_eq!(evil.failed_during, Some(ArchiveState::Extracting));
    assert_eq!(evil.error.as_ref().unwrap().kind, "unsafe_path");

    let archive = run.archive.unwrap();
    assert!(archive.entries().iter().all(|e| e.starts_with("good/")));
}

#[test]
fn file_directory_clash_fails_only_its_archive() {
    let staging = TempDir::new().unwrap();
    let uploads = batch(&[
        ("clash.zip", &[("a", "file"), ("a/b.cif", SAMPLE_CIF)]),
        ("B.zip", &[("y.cif", SAMPLE_CIF)]),
    ]);

    let run = converter(Config::default(), &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();

    let clash = &run.report.archives[0];
    assert_eq!(clash.state, ArchiveState::Failed);
    assert_eq!(clash.error.as_ref().unwrap().kind, "corrupt_archive");
    assert!(run.report.archives[1].is_done());
    assert_eq!(run.report.converted_files(), 1);

    let mut entries = run.archive.unwrap().entries().to_vec();
    entries.sort();
    assert_eq!(entries, vec!["B/y.cif", "B/y.pdb"]);
}

#[test]
fn nested_files_need_recursive_scan() {
    let staging = TempDir::new().unwrap();
    let uploads = batch(&[(
        "fold.zip",
        &[("top.cif", SAMPLE_CIF), ("seeds/seed_1.cif", SAMPLE_CIF)],
    )]);

    let flat = converter(Config::default(), &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();
    assert_eq!(flat.report.converted_files(), 1);
    assert!(!flat
        .archive
        .unwrap()
        .entries()
        .contains(&"fold/seeds/seed_1.pdb".to_string()));

    let mut config = Config::default();
    config.conversion.recursive_scan = true;
    let deep = converter(config, &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();
    assert_eq!(deep.report.converted_files(), 2);
    assert!(deep
        .archive
        .unwrap()
        .entries()
        .contains(&"fold/seeds/seed_1.pdb".to_string()));
}

#[test]
fn macos_metadata_is_not_converted() {
    let staging = TempDir::new().unwrap();
    let mut config = Config::default();
    config.conversion.recursive_scan = true;
    let uploads = batch(&[(
        "mac.zip",
        &[
            ("model.cif", SAMPLE_CIF),
            ("._model.cif", "resource fork"),
            ("__MACOSX/._model.cif", "resource fork"),
        ],
    )]);

    let run = converter(config, &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();

    assert_eq!(run.report.converted_files(), 1);
    assert_eq!(run.report.skipped_files(), 0);
    assert_eq!(run.report.status(), RunStatus::Succeeded);
}

#[test]
fn report_is_packaged_when_requested() {
    let staging = TempDir::new().unwrap();
    let mut config = Config::default();
    config.packaging.include_report = true;
    config.packaging.compression = Compression::Stored;
    let uploads = batch(&[("A.zip", &[("x.cif", SAMPLE_CIF), ("bad.cif", MALFORMED_CIF)])]);

    let run = converter(config, &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();
    let archive = run.archive.unwrap();

    let names = zip_entry_names(archive.path());
    assert_eq!(names.last().map(String::as_str), Some(REPORT_ENTRY_NAME));

    let report: serde_json::Value =
        serde_json::from_str(&read_zip_entry(archive.path(), REPORT_ENTRY_NAME)).unwrap();
    let files = report["archives"][0]["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files
        .iter()
        .any(|f| f["source"] == "bad.cif" && f["error"]["kind"] == "parse_error"));
}

#[test]
fn pdb_archives_convert_to_mmcif() {
    let staging = TempDir::new().unwrap();
    let mut config = Config::default();
    config.conversion.source_format = StructureFormat::Pdb;
    config.conversion.target_format = StructureFormat::Mmcif;

    let pdb = "ATOM      1  N   MET A   1      12.345  -3.210   7.000  1.00 85.20           N\nEND\n";
    let uploads = batch(&[("legacy.zip", &[("1abc.pdb", pdb)])]);

    let run = converter(config, &staging)
        .convert_batch(&uploads, &mut |_, _| {})
        .unwrap();
    let archive = run.archive.unwrap();

    let cif = read_zip_entry(archive.path(), "legacy/1abc.cif");
    assert!(cif.starts_with("data_"));
    assert!(cif.contains("_atom_site.Cartn_x"));
}

#[test]
fn progress_reports_every_archive() {
    let staging = TempDir::new().unwrap();
    let uploads = batch(&[
        ("A.zip", &[("x.cif", SAMPLE_CIF)]),
        ("B.zip", &[]),
        ("C.zip", &[("y.cif", SAMPLE_CIF)]),
    ]);

    let mut seen = Vec::new();
    converter(Config::default(), &staging)
        .convert_batch(&uploads, &mut |done, total| seen.push((done, total)))
        .unwrap();

    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}
