use crate::error::{ConvertError, Result};
use crate::structure::StructureFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_NAME: &str = "converted_files.zip";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub conversion: ConversionConfig,
    pub extraction: ExtractionConfig,
    pub packaging: PackagingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub source_format: StructureFormat,
    pub target_format: StructureFormat,
    /// Keep source files next to their converted counterparts.
    pub retain_originals: bool,
    /// Look for structure files below the top level of each archive.
    pub recursive_scan: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_entries: usize,
    pub max_uncompressed_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackagingConfig {
    pub output_name: PathBuf,
    pub compression: Compression,
    pub include_report: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Deflated,
    Stored,
}

impl Compression {
    pub fn method(&self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            source_format: StructureFormat::Mmcif,
            target_format: StructureFormat::Pdb,
            retain_originals: true,
            recursive_scan: false,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_uncompressed_size: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            output_name: PathBuf::from(DEFAULT_OUTPUT_NAME),
            compression: Compression::Deflated,
            include_report: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConvertError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConvertError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["cif2pdb.toml", ".cif2pdb.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(source_format) = cli_args.source_format {
            self.conversion.source_format = source_format;
        }

        if let Some(target_format) = cli_args.target_format {
            self.conversion.target_format = target_format;
        }

        if let Some(retain) = cli_args.retain_originals {
            self.conversion.retain_originals = retain;
        }

        if cli_args.recursive_scan {
            self.conversion.recursive_scan = true;
        }

        if let Some(ref output) = cli_args.output_name {
            self.packaging.output_name = output.clone();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ConvertError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ConvertError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.conversion.source_format == self.conversion.target_format {
            return Err(ConvertError::Config {
                message: format!(
                    "Source and target formats are both {}",
                    self.conversion.source_format
                ),
            });
        }

        if self.extraction.max_entries == 0 {
            return Err(ConvertError::Config {
                message: "Maximum archive entries must be greater than 0".to_string(),
            });
        }

        if self.extraction.max_uncompressed_size == 0 {
            return Err(ConvertError::Config {
                message: "Maximum uncompressed size must be greater than 0".to_string(),
            });
        }

        if self.packaging.output_name.as_os_str().is_empty() {
            return Err(ConvertError::Config {
                message: "Output archive name must not be empty".to_string(),
            });
        }

        if let Some(parent) = self.packaging.output_name.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConvertError::Config {
                    message: format!("Parent directory does not exist: {}", parent.display()),
                });
            }
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub source_format: Option<StructureFormat>,
    pub target_format: Option<StructureFormat>,
    pub retain_originals: Option<bool>,
    pub recursive_scan: bool,
    pub output_name: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_format(mut self, format: Option<StructureFormat>) -> Self {
        self.source_format = format;
        self
    }

    pub fn with_target_format(mut self, format: Option<StructureFormat>) -> Self {
        self.target_format = format;
        self
    }

    pub fn with_retain_originals(mut self, retain: Option<bool>) -> Self {
        self.retain_originals = retain;
        self
    }

    pub fn with_recursive_scan(mut self, recursive: bool) -> Self {
        self.recursive_scan = recursive;
        self
    }

    pub fn with_output_name(mut self, output: Option<PathBuf>) -> Self {
        self.output_name = output;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversion.source_format, StructureFormat::Mmcif);
        assert_eq!(config.conversion.target_format, StructureFormat::Pdb);
        assert!(config.conversion.retain_originals);
        assert!(!config.conversion.recursive_scan);
        assert_eq!(
            config.packaging.output_name,
            PathBuf::from("converted_files.zip")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.conversion.target_format = StructureFormat::Mmcif;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.packaging.output_name = PathBuf::from("/definitely/not/here/out.zip");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.packaging.include_report = true;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(loaded_config.packaging.include_report);
        assert_eq!(loaded_config.packaging.compression, Compression::Deflated);
    }

    #[test]
    fn test_partial_config_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[conversion]\nretain_originals = false\n\n[packaging]\ncompression = \"stored\"\n",
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(!config.conversion.retain_originals);
        assert_eq!(config.conversion.source_format, StructureFormat::Mmcif);
        assert_eq!(config.packaging.compression, Compression::Stored);
        assert_eq!(config.extraction.max_entries, 10_000);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_source_format(Some(StructureFormat::Pdb))
            .with_target_format(Some(StructureFormat::Mmcif))
            .with_retain_originals(Some(false))
            .with_recursive_scan(true)
            .with_output_name(Some(PathBuf::from("results")));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.conversion.source_format, StructureFormat::Pdb);
        assert_eq!(config.conversion.target_format, StructureFormat::Mmcif);
        assert!(!config.conversion.retain_originals);
        assert!(config.conversion.recursive_scan);
        assert_eq!(config.packaging.output_name, PathBuf::from("results"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[conversion]"));
        assert!(sample.contains("[extraction]"));
        assert!(sample.contains("[packaging]"));
        assert!(sample.contains("source_format = \"mmcif\""));
    }
}
