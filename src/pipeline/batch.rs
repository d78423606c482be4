use crate::error::{ConvertError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One uploaded archive as received: its file name and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedArchive {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedArchive {
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ConvertError::file_system(path, e))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, bytes))
    }

    /// File name without directories or its final extension.
    pub fn stem(&self) -> String {
        let file_name = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name);
        let stem = match file_name.rfind('.') {
            Some(0) | None => file_name,
            Some(dot) => &file_name[..dot],
        };
        sanitize_entry_name(stem)
    }
}

/// Archives of one conversion run, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    archives: Vec<UploadedArchive>,
}

impl UploadBatch {
    pub fn new(archives: Vec<UploadedArchive>) -> Self {
        Self { archives }
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let archives = paths
            .iter()
            .map(UploadedArchive::from_path)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(archives))
    }

    pub fn archives(&self) -> &[UploadedArchive] {
        &self.archives
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Output folder names, one per archive, unique within the batch.
    ///
    /// Repeated stems get ` (2)`, ` (3)` and so on in arrival order.
    /// Comparison ignores case so names stay distinct on case-insensitive
    /// file systems.
    pub fn entry_names(&self) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut names = Vec::with_capacity(self.archives.len());

        for archive in &self.archives {
            let stem = archive.stem();
            let mut candidate = stem.clone();
            let mut counter = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{} ({})", stem, counter);
                counter += 1;
            }
            names.push(candidate);
        }

        names
    }
}

/// Scratch directory owned by one conversion run.
///
/// The directory and everything in it is removed when the `WorkDir` is
/// dropped, on every exit path.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("cif2pdb-")
            .tempdir()
            .map_err(|e| ConvertError::file_system(&std::env::temp_dir(), e))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn entry_dir(&self, entry_name: &str) -> PathBuf {
        self.dir.path().join(entry_name)
    }

    /// Remove the directory now and report failures instead of ignoring them.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| ConvertError::file_system(&path, e))
    }
}

/// An archive's output folder name and its extracted directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub dir: PathBuf,
}

impl ArchiveEntry {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, dir: P) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

fn sanitize_entry_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "archive".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(names: &[&str]) -> UploadBatch {
        UploadBatch::new(
            names
                .iter()
                .map(|n| UploadedArchive::new(*n, Vec::new()))
                .collect(),
        )
    }

    #[test]
    fn test_stems() {
        assert_eq!(UploadedArchive::new("A.zip", vec![]).stem(), "A");
        assert_eq!(UploadedArchive::new("uploads/run.1.zip", vec![]).stem(), "run.1");
        assert_eq!(UploadedArchive::new("noext", vec![]).stem(), "noext");
        assert_eq!(UploadedArchive::new(".zip", vec![]).stem(), ".zip");
        assert_eq!(UploadedArchive::new("..", vec![]).stem(), "archive");
        assert_eq!(UploadedArchive::new("a:b?.zip", vec![]).stem(), "a_b_");
    }

    #[test]
    fn test_duplicate_stems_get_suffixes() {
        let names = batch(&["A.zip", "B.zip", "dir/A.zip", "a.zip", "A (2).zip"]).entry_names();
        assert_eq!(names, vec!["A", "B", "A (2)", "a (3)", "A (2) (2)"]);
    }

    #[test]
    fn test_workdir_cleanup() {
        let workdir = WorkDir::create().unwrap();
        let path = workdir.path().to_path_buf();
        fs::create_dir_all(workdir.entry_dir("A")).unwrap();
        fs::write(workdir.entry_dir("A").join("x.cif"), "data_x").unwrap();
        assert!(path.exists());

        drop(workdir);
        assert!(!path.exists());

        let workdir = WorkDir::create().unwrap();
        let path = workdir.path().to_path_buf();
        workdir.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_workdirs_are_unique() {
        let first = WorkDir::create().unwrap();
        let second = WorkDir::create().unwrap();
        assert_ne!(first.path(), second.path());
    }
}
