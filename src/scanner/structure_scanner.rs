use crate::config::ConversionConfig;
use crate::error::{ConvertError, Result};
use crate::scanner::file_filter::StructureFilter;
use crate::structure::StructureFormat;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A structure file discovered inside an extracted archive.
#[derive(Debug, Clone)]
pub struct StructureFile {
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    pub filename: String,
    pub size: u64,
    /// Same directory and stem as the source, with the target extension.
    pub output_path: PathBuf,
}

impl StructureFile {
    pub fn new(
        source_path: PathBuf,
        relative_path: PathBuf,
        size: u64,
        target: StructureFormat,
    ) -> Self {
        let filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        let output_path = source_path.with_extension(target.output_extension());

        Self {
            source_path,
            relative_path,
            filename,
            size,
            output_path,
        }
    }

    pub fn display_path(&self) -> String {
        self.relative_path.display().to_string()
    }

    pub fn output_relative_path(&self) -> PathBuf {
        self.relative_path.with_extension(
            self.output_path
                .extension()
                .unwrap_or_default(),
        )
    }
}

pub struct StructureScanner {
    filter: StructureFilter,
    target: StructureFormat,
    recursive: bool,
}

impl StructureScanner {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            filter: StructureFilter::new(config.source_format),
            target: config.target_format,
            recursive: config.recursive_scan,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Find convertible files under `root`, sorted by relative path.
    ///
    /// Finding nothing is not an error. Symlinks are never followed.
    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<Vec<StructureFile>> {
        let root_path = root.as_ref();

        if !root_path.is_dir() {
            return Err(ConvertError::InvalidPath {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root_path)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_traverse(e));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root_path).to_path_buf();
                ConvertError::file_system(&path, e.into())
            })?;

            if !entry.file_type().is_file() || !self.filter.is_structure_file(entry.path()) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| ConvertError::file_system(entry.path(), e.into()))?;
            let relative_path = self.calculate_relative_path(entry.path(), root_path)?;

            files.push(StructureFile::new(
                entry.path().to_path_buf(),
                relative_path,
                metadata.len(),
                self.target,
            ));
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    fn should_traverse(&self, entry: &DirEntry) -> bool {
        if entry.file_type().is_dir() {
            return self.filter.should_traverse_directory(entry.path());
        }
        true
    }

    fn calculate_relative_path(&self, file_path: &Path, root_path: &Path) -> Result<PathBuf> {
        let relative = file_path
            .strip_prefix(root_path)
            .map_err(|_| ConvertError::InvalidPath {
                path: format!(
                    "Cannot calculate relative path for {} from root {}",
                    file_path.display(),
                    root_path.display()
                ),
            })?;

        Ok(relative.to_path_buf())
    }
}
