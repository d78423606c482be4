pub mod output;
pub mod progress;
pub mod signals;

pub use output::{DryRunCounts, DryRunEntry, OutputFormatter, OutputMode};
pub use progress::ProgressManager;
pub use signals::GracefulShutdown;
