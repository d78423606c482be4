use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO operation failed on {path}: {source}")]
    FileSystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {archive} is not a valid ZIP container: {message}")]
    CorruptArchive { archive: String, message: String },

    #[error("Archive {archive} contains an unsafe entry path: {entry}")]
    UnsafePath { archive: String, entry: String },

    #[error("Archive {archive} is too large: {size} (max: {max_size})")]
    ArchiveTooLarge {
        archive: String,
        size: u64,
        max_size: u64,
    },

    #[error("Archive {archive} has too many entries: {count} (max: {max_entries})")]
    TooManyEntries {
        archive: String,
        count: usize,
        max_entries: usize,
    },

    #[error("Failed to parse structure {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to write structure {path}: {message}")]
    Serialization { path: String, message: String },

    #[error("Failed to write output archive: {message}")]
    Packaging { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Output archive already exists: {path}")]
    OutputExists { path: String },
}

/// How far a failure reaches inside a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Only the structure file being converted.
    File,
    /// Only the uploaded archive being processed.
    Archive,
    /// The whole run.
    Run,
}

impl ConvertError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            ConvertError::Parse { .. } | ConvertError::Serialization { .. } => ErrorScope::File,
            ConvertError::CorruptArchive { .. }
            | ConvertError::UnsafePath { .. }
            | ConvertError::ArchiveTooLarge { .. }
            | ConvertError::TooManyEntries { .. } => ErrorScope::Archive,
            _ => ErrorScope::Run,
        }
    }

    pub fn file_system(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return ConvertError::Permission {
                path: path.display().to_string(),
            };
        }
        ConvertError::FileSystem {
            path: path.display().to_string(),
            source,
        }
    }

    /// Short machine-readable name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Io(_) | ConvertError::FileSystem { .. } => "io_failure",
            ConvertError::CorruptArchive { .. } => "corrupt_archive",
            ConvertError::UnsafePath { .. } => "unsafe_path",
            ConvertError::ArchiveTooLarge { .. } => "archive_too_large",
            ConvertError::TooManyEntries { .. } => "too_many_entries",
            ConvertError::Parse { .. } => "parse_error",
            ConvertError::Serialization { .. } => "serialization_error",
            ConvertError::Packaging { .. } => "packaging_error",
            ConvertError::Config { .. } => "config_error",
            ConvertError::Permission { .. } => "permission_denied",
            ConvertError::Cancelled => "cancelled",
            ConvertError::InvalidPath { .. } => "invalid_path",
            ConvertError::OutputExists { .. } => "output_exists",
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ConvertError {
    fn user_message(&self) -> String {
        match self {
            ConvertError::FileSystem { path, source } => {
                format!("Could not access {}: {}", path, source)
            }
            ConvertError::CorruptArchive { archive, .. } => {
                format!("{} is not a readable ZIP archive", archive)
            }
            ConvertError::UnsafePath { archive, entry } => {
                format!("{} tries to write outside its folder: {}", archive, entry)
            }
            ConvertError::ArchiveTooLarge {
                archive,
                size,
                max_size,
            } => {
                format!(
                    "{} expands to {} (maximum allowed: {})",
                    archive,
                    format_bytes(*size),
                    format_bytes(*max_size)
                )
            }
            ConvertError::TooManyEntries {
                archive,
                count,
                max_entries,
            } => {
                format!(
                    "{} holds {} entries (maximum allowed: {})",
                    archive, count, max_entries
                )
            }
            ConvertError::Parse { path, message } => {
                format!("Could not read structure {}: {}", path, message)
            }
            ConvertError::Serialization { path, message } => {
                format!("Could not write structure {}: {}", path, message)
            }
            ConvertError::Packaging { message } => {
                format!("Could not create the output archive: {}", message)
            }
            ConvertError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ConvertError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            ConvertError::Cancelled => "Operation was cancelled by user".to_string(),
            ConvertError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            ConvertError::OutputExists { path } => {
                format!("Output archive already exists: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ConvertError::CorruptArchive { .. } => Some(
                "Re-download the archive and check that it opens with a regular ZIP tool.".to_string()
            ),
            ConvertError::UnsafePath { .. } => Some(
                "The archive contains entries such as '../'. Only archives with relative entry paths are accepted.".to_string()
            ),
            ConvertError::ArchiveTooLarge { .. } | ConvertError::TooManyEntries { .. } => Some(
                "Raise extraction.max_uncompressed_size or extraction.max_entries in the configuration file.".to_string()
            ),
            ConvertError::Parse { .. } => Some(
                "Check that the file is a complete mmCIF file with an _atom_site table.".to_string()
            ),
            ConvertError::Serialization { .. } => Some(
                "Structures with multi-character chain IDs or more than 99,999 atoms do not fit the PDB format; keep them as mmCIF.".to_string()
            ),
            ConvertError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            ConvertError::Permission { .. } => Some(
                "Ensure you have the necessary read/write permissions for the target directory.".to_string()
            ),
            ConvertError::OutputExists { .. } => Some(
                "Remove the existing file, choose a different name with --output, or use --force to overwrite.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ConvertError {
    fn from(error: zip::result::ZipError) -> Self {
        match error {
            zip::result::ZipError::Io(e) => ConvertError::Io(e),
            other => ConvertError::Packaging {
                message: other.to_string(),
            },
        }
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(error: toml::de::Error) -> Self {
        ConvertError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
