use crate::cli::OutputFormat;
use crate::error::{format_bytes, ConvertError, UserFriendlyError};
use crate::pipeline::{ArchiveState, BatchReport, RunStatus};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

/// What a dry run found in one archive.
#[derive(Debug, Clone)]
pub struct DryRunEntry {
    pub archive: String,
    pub entry_name: String,
    pub outcome: std::result::Result<DryRunCounts, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCounts {
    pub total_entries: usize,
    pub convertible: usize,
}

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &ConvertError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Print the outcome of a run; `output` is where the archive was written.
    pub fn print_batch_report(&self, report: &BatchReport, output: Option<&Path>) {
        match self.mode {
            OutputMode::Human => {
                if !self.quiet {
                    self.print_human_report(report, output);
                }
            }
            OutputMode::Json => {
                let json = serde_json::json!({
                    "type": "report",
                    "status": report.status(),
                    "output": output.map(|p| p.display().to_string()),
                    "report": report,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputMode::Plain => self.print_plain_report(report, output),
        }
    }

    pub fn print_dry_run(&self, entries: &[DryRunEntry]) {
        match self.mode {
            OutputMode::Json => {
                let archives: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|entry| match &entry.outcome {
                        Ok(counts) => serde_json::json!({
                            "archive": entry.archive,
                            "entry_name": entry.entry_name,
                            "total_entries": counts.total_entries,
                            "convertible": counts.convertible,
                        }),
                        Err(message) => serde_json::json!({
                            "archive": entry.archive,
                            "entry_name": entry.entry_name,
                            "error": message,
                        }),
                    })
                    .collect();
                self.print_json_object(&serde_json::json!({
                    "type": "dry_run",
                    "archives": archives,
                }));
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header("Dry run");
                for entry in entries {
                    match &entry.outcome {
                        Ok(counts) => println!(
                            "  {} -> {}/: {} of {} entries would be converted",
                            entry.archive, entry.entry_name, counts.convertible, counts.total_entries
                        ),
                        Err(message) => {
                            println!("  {} -> would fail: {}", entry.archive, message)
                        }
                    }
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        let (emoji, styled) = match msg_type {
            MessageType::Success => (CHECKMARK, style(message).green().bold()),
            MessageType::Error => (CROSS, style(message).red().bold()),
            MessageType::Warning => (WARNING, style(message).yellow().bold()),
            MessageType::Info => (INFO, style(message).cyan()),
        };

        let line = if self.use_colors {
            format!("{}{}", emoji, styled)
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };
            format!("{} {}", prefix, message)
        };

        match msg_type {
            MessageType::Error | MessageType::Warning => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_report(&self, report: &BatchReport, output: Option<&Path>) {
        self.print_header("Conversion Report");

        for archive in &report.archives {
            match archive.state {
                ArchiveState::Done => {
                    let line = format!(
                        "{} -> {}/: {} converted, {} skipped",
                        archive.name,
                        archive.entry_name,
                        archive.converted_count(),
                        archive.failed_count()
                    );
                    if archive.failed_count() == 0 {
                        self.print_human_message(MessageType::Success, &line);
                    } else {
                        self.print_human_message(MessageType::Warning, &line);
                    }
                    if self.verbose_level >= 1 {
                        for file in archive.files.iter().filter(|f| !f.is_success()) {
                            if let Some(error) = &file.error {
                                println!("    {}: {}", file.source, error.message);
                            }
                        }
                    }
                }
                _ => {
                    let reason = archive
                        .error
                        .as_ref()
                        .map(|e| e.message.as_str())
                        .unwrap_or("unknown error");
                    self.print_human_message(
                        MessageType::Error,
                        &format!("{}: failed ({})", archive.name, reason),
                    );
                }
            }
        }

        println!();
        self.print_separator();
        println!(
            "  Archives:        {}",
            self.highlight(report.archives.len().to_string())
        );
        println!(
            "  Files converted: {}",
            self.highlight(report.converted_files().to_string())
        );
        if report.skipped_files() > 0 {
            println!("  Files skipped:   {}", report.skipped_files());
        }
        if report.failed_archives() > 0 {
            println!("  Failed archives: {}", report.failed_archives());
        }
        println!(
            "  Time taken:      {}",
            self.highlight(format_duration(report.duration()))
        );
        if let Some(path) = output {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!(
                "  Output:          {} ({})",
                self.highlight(path.display().to_string()),
                format_bytes(size)
            );
        }
        self.print_separator();

        match report.status() {
            RunStatus::Succeeded => self.success("All structure files converted"),
            RunStatus::SucceededWithSkips {
                skipped_files,
                failed_archives,
            } => self.warning(&format!(
                "Completed with {} skipped file(s) and {} failed archive(s)",
                skipped_files, failed_archives
            )),
        }
    }

    fn print_plain_report(&self, report: &BatchReport, output: Option<&Path>) {
        for archive in &report.archives {
            println!(
                "ARCHIVE: {} state={} converted={} skipped={}",
                archive.name,
                archive.state,
                archive.converted_count(),
                archive.failed_count()
            );
        }
        println!("Converted: {}", report.converted_files());
        println!("Skipped: {}", report.skipped_files());
        println!("Failed archives: {}", report.failed_archives());
        if let Some(path) = output {
            println!("Output: {}", path.display());
        }
        match report.status() {
            RunStatus::Succeeded => println!("STATUS: succeeded"),
            RunStatus::SucceededWithSkips { .. } => println!("STATUS: succeeded_with_skips"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
