pub mod mmcif;
pub mod model;
pub mod pdb;

pub use model::{Atom, RecordKind, StructuralModel};

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    /// Macromolecular CIF
    Mmcif,
    /// Legacy fixed-column PDB
    Pdb,
}

impl StructureFormat {
    /// File extensions recognised as this format, lowercase.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            StructureFormat::Mmcif => &["cif", "mmcif"],
            StructureFormat::Pdb => &["pdb", "ent"],
        }
    }

    /// Extension given to files written in this format.
    pub fn output_extension(&self) -> &'static str {
        match self {
            StructureFormat::Mmcif => "cif",
            StructureFormat::Pdb => "pdb",
        }
    }

    pub fn matches_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions().contains(&e.to_lowercase().as_str()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            StructureFormat::Mmcif => "mmCIF",
            StructureFormat::Pdb => "PDB",
        }
    }
}

impl std::fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses and serializes whole structure files.
///
/// The pipeline never looks inside a [`StructuralModel`]; it only moves one
/// from `parse` to `serialize`.
pub trait StructureCodec: Send + Sync {
    fn parse(&self, path: &Path) -> Result<StructuralModel>;
    fn serialize(&self, model: &StructuralModel, path: &Path) -> Result<()>;
}

/// Codec reading one [`StructureFormat`] and writing another.
#[derive(Debug, Clone, Copy)]
pub struct FormatCodec {
    source: StructureFormat,
    target: StructureFormat,
}

impl FormatCodec {
    pub fn new(source: StructureFormat, target: StructureFormat) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> StructureFormat {
        self.source
    }

    pub fn target(&self) -> StructureFormat {
        self.target
    }
}

impl Default for FormatCodec {
    fn default() -> Self {
        Self::new(StructureFormat::Mmcif, StructureFormat::Pdb)
    }
}

impl StructureCodec for FormatCodec {
    fn parse(&self, path: &Path) -> Result<StructuralModel> {
        let parse_error = |message: String| ConvertError::Parse {
            path: path.display().to_string(),
            message,
        };

        let bytes = fs::read(path).map_err(|e| parse_error(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| parse_error("file is not valid UTF-8 text".to_string()))?;

        match self.source {
            StructureFormat::Mmcif => mmcif::parse_str(&text),
            StructureFormat::Pdb => {
                let id = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("structure");
                pdb::parse_str(&text, id)
            }
        }
        .map_err(parse_error)
    }

    fn serialize(&self, model: &StructuralModel, path: &Path) -> Result<()> {
        let serialization_error = |message: String| ConvertError::Serialization {
            path: path.display().to_string(),
            message,
        };

        let text = match self.target {
            StructureFormat::Mmcif => mmcif::write_string(model),
            StructureFormat::Pdb => pdb::write_string(model).map_err(serialization_error)?,
        };

        fs::write(path, text).map_err(|e| serialization_error(e.to_string()))
    }
}
