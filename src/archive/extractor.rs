use crate::config::ExtractionConfig;
use crate::error::{ConvertError, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Files and directories written by one extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTree {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub directories: usize,
    pub bytes_written: u64,
}

/// Unpacks uploaded ZIP archives with entry-path and size checks.
pub struct ArchiveExtractor {
    max_entries: usize,
    max_uncompressed_size: u64,
}

impl ArchiveExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            max_uncompressed_size: config.max_uncompressed_size,
        }
    }

    /// Extract every entry of `bytes` below `destination`.
    ///
    /// All entry names are validated before anything is written, so an
    /// archive with one unsafe path leaves no files behind.
    pub fn extract(&self, name: &str, bytes: &[u8], destination: &Path) -> Result<ExtractedTree> {
        let mut archive = self.open(name, bytes)?;
        let entries = self.validate_entries(name, &mut archive)?;

        fs::create_dir_all(destination)
            .map_err(|e| ConvertError::file_system(destination, e))?;

        let mut tree = ExtractedTree {
            root: destination.to_path_buf(),
            ..Default::default()
        };
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        for (index, relative) in entries {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| corrupt(name, e.to_string()))?;
            let output_path = destination.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)
                    .map_err(|e| ConvertError::file_system(&output_path, e))?;
                tree.directories += 1;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent).map_err(|e| ConvertError::file_system(parent, e))?;
            }

            let file = fs::File::create(&output_path)
                .map_err(|e| ConvertError::file_system(&output_path, e))?;
            let mut writer = BufWriter::new(file);

            loop {
                let read = entry
                    .read(&mut buffer)
                    .map_err(|e| corrupt(name, format!("{}: {}", relative.display(), e)))?;
                if read == 0 {
                    break;
                }

                tree.bytes_written += read as u64;
                // Declared sizes are untrusted
                if tree.bytes_written > self.max_uncompressed_size {
                    return Err(ConvertError::ArchiveTooLarge {
                        archive: name.to_string(),
                        size: tree.bytes_written,
                        max_size: self.max_uncompressed_size,
                    });
                }

                writer
                    .write_all(&buffer[..read])
                    .map_err(|e| ConvertError::file_system(&output_path, e))?;
            }

            writer
                .flush()
                .map_err(|e| ConvertError::file_system(&output_path, e))?;
            debug!(archive = name, entry = %relative.display(), "extracted entry");
            tree.files.push(output_path);
        }

        Ok(tree)
    }

    /// Relative paths of the file entries in `bytes`, without extracting.
    pub fn list_entries(&self, name: &str, bytes: &[u8]) -> Result<Vec<PathBuf>> {
        let mut archive = self.open(name, bytes)?;
        let entries = self.validate_entries(name, &mut archive)?;

        let mut files = Vec::new();
        for (index, relative) in entries {
            let entry = archive
                .by_index(index)
                .map_err(|e| corrupt(name, e.to_string()))?;
            if !entry.is_dir() {
                files.push(relative);
            }
        }
        Ok(files)
    }

    fn open<'a>(&self, name: &str, bytes: &'a [u8]) -> Result<ZipArchive<Cursor<&'a [u8]>>> {
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(name, e.to_string()))
    }

    fn validate_entries(
        &self,
        name: &str,
        archive: &mut ZipArchive<Cursor<&[u8]>>,
    ) -> Result<Vec<(usize, PathBuf)>> {
        if archive.len() > self.max_entries {
            return Err(ConvertError::TooManyEntries {
                archive: name.to_string(),
                count: archive.len(),
                max_entries: self.max_entries,
            });
        }

        let mut entries = Vec::with_capacity(archive.len());
        let mut files = HashSet::new();
        let mut directories = HashSet::new();
        let mut declared_size = 0u64;

        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| corrupt(name, e.to_string()))?;

            let enclosed = entry
                .enclosed_name()
                .filter(|_| !escapes_root(entry.name()));
            let relative = match enclosed {
                Some(path) => path.to_path_buf(),
                None => {
                    return Err(ConvertError::UnsafePath {
                        archive: name.to_string(),
                        entry: entry.name().to_string(),
                    })
                }
            };

            declared_size = declared_size.saturating_add(entry.size());
            if declared_size > self.max_uncompressed_size {
                return Err(ConvertError::ArchiveTooLarge {
                    archive: name.to_string(),
                    size: declared_size,
                    max_size: self.max_uncompressed_size,
                });
            }

            if entry.is_dir() {
                directories.insert(relative.clone());
            } else {
                files.insert(relative.clone());
            }
            entries.push((index, relative));
        }

        if let Some(clash) = file_directory_clash(&files, &directories) {
            return Err(corrupt(
                name,
                format!("entry {} is both a file and a directory", clash.display()),
            ));
        }

        Ok(entries)
    }
}

/// Whether a raw entry name is absolute or climbs above the archive root
/// under either separator convention.
fn escapes_root(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if raw.starts_with(['/', '\\']) || has_drive {
        return true;
    }

    let mut depth = 0usize;
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            _ => depth += 1,
        }
    }
    false
}

/// First path that some entry needs as a directory while another entry is a
/// file of that name.
fn file_directory_clash<'a>(
    files: &'a HashSet<PathBuf>,
    directories: &'a HashSet<PathBuf>,
) -> Option<&'a Path> {
    if let Some(dir) = directories.iter().find(|dir| files.contains(*dir)) {
        return Some(dir.as_path());
    }

    files
        .iter()
        .chain(directories.iter())
        .flat_map(|path| path.ancestors().skip(1))
        .find(|ancestor| files.contains(*ancestor))
}

fn corrupt(archive: &str, message: String) -> ConvertError {
    ConvertError::CorruptArchive {
        archive: archive.to_string(),
        message,
    }
}
