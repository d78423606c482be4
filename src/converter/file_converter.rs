use crate::error::{ConvertError, Result};
use crate::scanner::StructureFile;
use crate::structure::StructureCodec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Error details kept in reports after the error value itself is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: String,
    pub message: String,
}

impl From<&ConvertError> for ReportedError {
    fn from(error: &ConvertError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Outcome of converting one structure file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Path of the source file relative to its archive.
    pub source: String,
    /// Path of the derived file relative to its archive, when one was written.
    pub output: Option<String>,
    pub error: Option<ReportedError>,
}

impl ConversionResult {
    pub fn success(file: &StructureFile) -> Self {
        Self {
            source: file.display_path(),
            output: Some(file.output_relative_path().display().to_string()),
            error: None,
        }
    }

    pub fn failure(file: &StructureFile, error: &ConvertError) -> Self {
        Self {
            source: file.display_path(),
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Converts structure files in place through a [`StructureCodec`].
#[derive(Clone)]
pub struct FileConverter {
    codec: Arc<dyn StructureCodec>,
    retain_originals: bool,
}

impl FileConverter {
    pub fn new(codec: Arc<dyn StructureCodec>) -> Self {
        Self {
            codec,
            retain_originals: true,
        }
    }

    pub fn with_retain_originals(mut self, retain: bool) -> Self {
        self.retain_originals = retain;
        self
    }

    /// Convert one file and return the path of the derived file.
    ///
    /// The derived file is written to a temporary sibling and renamed into
    /// place, so a failed conversion leaves no partial output. The source is
    /// removed only after a successful conversion and only when originals
    /// are not retained.
    pub fn convert(&self, file: &StructureFile) -> Result<PathBuf> {
        let model = self.codec.parse(&file.source_path)?;
        debug!(
            file = %file.display_path(),
            atoms = model.atom_count(),
            "parsed structure"
        );

        let directory = file
            .output_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let staged = NamedTempFile::new_in(directory)
            .map_err(|e| serialization_error(&file.output_path, e))?;

        self.codec.serialize(&model, staged.path())?;
        staged
            .persist(&file.output_path)
            .map_err(|e| serialization_error(&file.output_path, e.error))?;

        if !self.retain_originals {
            if let Err(e) = fs::remove_file(&file.source_path) {
                warn!(file = %file.display_path(), error = %e, "could not remove original");
            }
        }

        Ok(file.output_path.clone())
    }

    /// Convert every file, recording one result per file in input order.
    pub fn convert_all(&self, files: &[StructureFile]) -> Vec<ConversionResult> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            files.par_iter().map(|file| self.convert_recorded(file)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            files.iter().map(|file| self.convert_recorded(file)).collect()
        }
    }

    fn convert_recorded(&self, file: &StructureFile) -> ConversionResult {
        match self.convert(file) {
            Ok(_) => {
                debug!(file = %file.display_path(), "converted");
                ConversionResult::success(file)
            }
            Err(e) => {
                warn!(file = %file.display_path(), error = %e, "conversion failed");
                ConversionResult::failure(file, &e)
            }
        }
    }
}

fn serialization_error(path: &Path, error: std::io::Error) -> ConvertError {
    ConvertError::Serialization {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
