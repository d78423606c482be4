use anyhow::Context;
use cif2pdb::{Cif2Pdb, Cli, ConvertError, OutputFormatter, OutputMode, RunStatus, UserFriendlyError};
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let cif2pdb = match Cif2Pdb::from_cli(&cli) {
        Ok(cif2pdb) => cif2pdb,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &cif2pdb);
    }

    match cif2pdb.convert_archives(&cli.archives).await {
        Ok(outcome) => {
            cif2pdb
                .output_formatter()
                .print_batch_report(&outcome.report, outcome.output_path.as_deref());

            match (outcome.report.status(), outcome.output_path) {
                (RunStatus::Succeeded, Some(_)) => 0,
                // Partial success, or nothing was written
                _ => 2,
            }
        }
        Err(e) => {
            cif2pdb.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &ConvertError) -> i32 {
    match error {
        ConvertError::Cancelled => 130,
        ConvertError::Permission { .. } => 7,
        ConvertError::OutputExists { .. } => 8,
        _ => 1,
    }
}

fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_directive()))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("a global subscriber is already installed")?;

    Ok(())
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "cif2pdb.toml".to_string());

    match Cif2Pdb::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  cif2pdb <archive.zip> --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, cif2pdb: &Cif2Pdb) -> i32 {
    let formatter = cif2pdb.output_formatter();
    let config = cif2pdb.config();

    if formatter.mode() != OutputMode::Json {
        formatter.info("DRY RUN MODE - nothing will be extracted or written");
        formatter.info(&format!(
            "Converting {} -> {}, originals {}, {} scan",
            config.conversion.source_format,
            config.conversion.target_format,
            if config.conversion.retain_originals {
                "retained"
            } else {
                "replaced"
            },
            if config.conversion.recursive_scan {
                "recursive"
            } else {
                "top-level"
            }
        ));
        formatter.info(&format!(
            "Output archive: {}",
            config.packaging.output_name.display()
        ));
    }

    let entries = match cif2pdb.plan_conversion(&cli.archives) {
        Ok(entries) => entries,
        Err(e) => {
            cif2pdb.handle_error(&e);
            return exit_code_for(&e);
        }
    };

    formatter.print_dry_run(&entries);

    if config.packaging.output_name.exists() && !cli.force {
        formatter.warning("Output archive already exists; use --force to overwrite it");
    }

    if entries.iter().all(|entry| entry.outcome.is_ok()) {
        0
    } else {
        2
    }
}

fn print_startup_error(error: &ConvertError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cif2pdb::Config;
    use std::fs;
    use tempfile::TempDir;

    fn test_instance() -> Cif2Pdb {
        Cif2Pdb::new_for_test(Config::default(), OutputMode::Plain, 0, true)
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "cif2pdb",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), 0);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[conversion]"));
    }

    #[test]
    fn test_dry_run_with_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.zip");

        let cli = Cli::try_parse_from(["cif2pdb", missing.to_str().unwrap(), "--dry-run", "-q"])
            .unwrap();

        assert_eq!(handle_dry_run(&cli, &test_instance()), 1);
    }

    #[test]
    fn test_dry_run_with_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let corrupt = temp_dir.path().join("bad.zip");
        fs::write(&corrupt, "not a zip").unwrap();

        let cli = Cli::try_parse_from(["cif2pdb", corrupt.to_str().unwrap(), "--dry-run", "-q"])
            .unwrap();

        assert_eq!(handle_dry_run(&cli, &test_instance()), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&ConvertError::Cancelled), 130);
        assert_eq!(
            exit_code_for(&ConvertError::OutputExists {
                path: "out.zip".to_string()
            }),
            8
        );
        assert_eq!(
            exit_code_for(&ConvertError::Packaging {
                message: "boom".to_string()
            }),
            1
        );
    }
}
