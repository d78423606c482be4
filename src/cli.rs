use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::structure::StructureFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cif2pdb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert ZIP archives of mmCIF structures to PDB")]
#[command(
    long_about = "cif2pdb extracts each ZIP archive, converts every structure file it finds \
                  and writes one combined ZIP with a folder per input archive."
)]
#[command(after_help = "EXAMPLES:\n  \
    cif2pdb predictions.zip\n  \
    cif2pdb fold_a.zip fold_b.zip --output results.zip --retain-originals false\n  \
    cif2pdb models.zip --recursive-scan --output-format json\n  \
    cif2pdb legacy.zip --source-format pdb --target-format mmcif\n  \
    cif2pdb --generate-config --config cif2pdb.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// ZIP archives to convert, processed in the given order
    #[arg(required_unless_present = "generate_config")]
    pub archives: Vec<PathBuf>,

    /// Output archive path (defaults to converted_files.zip)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Format of the structure files inside the archives
    #[arg(long, value_enum)]
    pub source_format: Option<StructureFormat>,

    /// Format to convert structure files to
    #[arg(long, value_enum)]
    pub target_format: Option<StructureFormat>,

    /// Keep source files next to the converted files
    #[arg(long, value_name = "BOOL")]
    pub retain_originals: Option<bool>,

    /// Look for structure files in subdirectories of each archive
    #[arg(long)]
    pub recursive_scan: bool,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Overwrite an existing output archive
    #[arg(long)]
    pub force: bool,

    /// Show what would be converted without extracting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_source_format(self.source_format)
            .with_target_format(self.target_format)
            .with_retain_originals(self.retain_originals)
            .with_recursive_scan(self.recursive_scan)
            .with_output_name(self.output.clone())
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Default `tracing` filter directive for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbosity_level() {
            0 => "cif2pdb=warn",
            1 => "cif2pdb=info",
            2 => "cif2pdb=debug",
            _ => "cif2pdb=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archives_and_flags() {
        let cli = Cli::try_parse_from([
            "cif2pdb",
            "a.zip",
            "b.zip",
            "--output",
            "out",
            "--retain-originals",
            "false",
            "--recursive-scan",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.archives, vec![PathBuf::from("a.zip"), PathBuf::from("b.zip")]);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.retain_originals, Some(false));
        assert!(cli.recursive_scan);
        assert_eq!(cli.log_directive(), "cif2pdb=debug");
    }

    #[test]
    fn test_archives_required_without_generate_config() {
        assert!(Cli::try_parse_from(["cif2pdb", "--force"]).is_err());
        assert!(Cli::try_parse_from(["cif2pdb", "--generate-config"]).is_ok());
    }

    #[test]
    fn test_format_overrides() {
        let cli = Cli::try_parse_from([
            "cif2pdb",
            "legacy.zip",
            "--source-format",
            "pdb",
            "--target-format",
            "mmcif",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.conversion.source_format, StructureFormat::Pdb);
        assert_eq!(config.conversion.target_format, StructureFormat::Mmcif);
    }

    #[test]
    fn test_same_formats_rejected() {
        let cli = Cli::try_parse_from(["cif2pdb", "a.zip", "--target-format", "mmcif"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["cif2pdb", "a.zip", "-q", "-v"]).is_err());
    }
}
