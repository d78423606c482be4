use crate::config::{Compression, PackagingConfig};
use crate::error::{ConvertError, Result};
use crate::pipeline::ArchiveEntry;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const REPORT_ENTRY_NAME: &str = "conversion_report.json";

/// The combined output archive, held in a temporary file until persisted.
///
/// Dropping an `OutputArchive` without calling [`OutputArchive::persist`]
/// deletes the temporary file.
#[derive(Debug)]
pub struct OutputArchive {
    file: NamedTempFile,
    file_name: String,
    entries: Vec<String>,
}

impl OutputArchive {
    pub const MIME_TYPE: &'static str = "application/zip";

    /// Name the caller chose for the download, taken as given.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Entry names in the order they were written.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn size(&self) -> Result<u64> {
        let metadata = self
            .file
            .as_file()
            .metadata()
            .map_err(|e| ConvertError::file_system(self.file.path(), e))?;
        Ok(metadata.len())
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        fs::read(self.file.path()).map_err(|e| ConvertError::file_system(self.file.path(), e))
    }

    /// Move the archive to `destination`.
    pub fn persist(self, destination: &Path, overwrite: bool) -> Result<PathBuf> {
        if destination.exists() && !overwrite {
            return Err(ConvertError::OutputExists {
                path: destination.display().to_string(),
            });
        }

        match self.file.persist(destination) {
            Ok(_) => Ok(destination.to_path_buf()),
            Err(err) => {
                // Rename fails across file systems; copy, then let the temp file drop
                debug!(error = %err.error, "rename failed, copying output archive");
                fs::copy(err.file.path(), destination)
                    .map_err(|e| ConvertError::file_system(destination, e))?;
                Ok(destination.to_path_buf())
            }
        }
    }
}

pub struct Repackager {
    compression: Compression,
    include_report: bool,
    staging_dir: Option<PathBuf>,
}

impl Repackager {
    pub fn new(config: &PackagingConfig) -> Self {
        Self {
            compression: config.compression,
            include_report: config.include_report,
            staging_dir: None,
        }
    }

    /// Directory that holds the temporary archive before it is persisted.
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn includes_report(&self) -> bool {
        self.include_report
    }

    /// Write every file under each entry's directory as `{name}/{path}`.
    ///
    /// Entries are written in the order given and files within an entry in
    /// file-name order, so equal inputs give equal entry lists. An entry
    /// whose directory is empty is written as a bare `{name}/` directory.
    pub fn pack(
        &self,
        archive_entries: &[ArchiveEntry],
        file_name: &str,
        report_json: Option<&str>,
    ) -> Result<OutputArchive> {
        let mut file = match &self.staging_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|e| ConvertError::Packaging {
            message: format!("Failed to create temporary archive: {}", e),
        })?;

        let options = SimpleFileOptions::default().compression_method(self.compression.method());
        let mut entries = Vec::new();

        {
            let mut zip = ZipWriter::new(file.as_file_mut());

            for archive_entry in archive_entries {
                let written_before = entries.len();

                for item in WalkDir::new(&archive_entry.dir)
                    .min_depth(1)
                    .follow_links(false)
                    .sort_by_file_name()
                {
                    let item = item.map_err(|e| {
                        let path = e.path().unwrap_or(&archive_entry.dir).to_path_buf();
                        ConvertError::file_system(&path, e.into())
                    })?;
                    if !item.file_type().is_file() {
                        continue;
                    }

                    let relative = item.path().strip_prefix(&archive_entry.dir).map_err(|_| {
                        ConvertError::InvalidPath {
                            path: item.path().display().to_string(),
                        }
                    })?;
                    let entry_name = entry_name(&archive_entry.name, relative);
                    let content = fs::read(item.path())
                        .map_err(|e| ConvertError::file_system(item.path(), e))?;

                    zip.start_file(entry_name.as_str(), options)?;
                    zip.write_all(&content).map_err(|e| ConvertError::Packaging {
                        message: format!("Failed to write {}: {}", entry_name, e),
                    })?;
                    entries.push(entry_name);
                }

                if entries.len() == written_before {
                    let dir_name = format!("{}/", archive_entry.name);
                    zip.add_directory(dir_name.as_str(), options)?;
                    entries.push(dir_name);
                }
            }

            if self.include_report {
                if let Some(json) = report_json {
                    zip.start_file(REPORT_ENTRY_NAME, options)?;
                    zip.write_all(json.as_bytes())
                        .map_err(|e| ConvertError::Packaging {
                            message: format!("Failed to write report: {}", e),
                        })?;
                    entries.push(REPORT_ENTRY_NAME.to_string());
                }
            }

            zip.finish()?;
        }

        file.as_file_mut().flush().map_err(|e| ConvertError::Packaging {
            message: e.to_string(),
        })?;

        info!(entries = entries.len(), file_name, "output archive written");

        Ok(OutputArchive {
            file,
            file_name: file_name.to_string(),
            entries,
        })
    }
}

fn entry_name(archive_name: &str, relative: &Path) -> String {
    let mut name = archive_name.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}
