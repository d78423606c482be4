use crate::error::{ConvertError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ctrl+C state shared between the signal handler and the pipeline.
///
/// The first interrupt asks for a graceful stop, which the pipeline observes
/// before starting the next archive. A second interrupt exits at once.
#[derive(Clone)]
pub struct GracefulShutdown {
    running: Arc<AtomicBool>,
    shutdown_message_shown: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let shutdown = Self::new_for_test();

        let running_clone = shutdown.running.clone();
        let message_shown_clone = shutdown.shutdown_message_shown.clone();

        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);

            if !message_shown_clone.swap(true, Ordering::SeqCst) {
                eprintln!(
                    "\n🛑 Stopping after the current archive... (press Ctrl+C again to force exit)"
                );
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| ConvertError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(shutdown)
    }

    /// Create an instance without registering a signal handler.
    pub fn new_for_test() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            shutdown_message_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if !self.is_running() {
            return Err(ConvertError::Cancelled);
        }
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::new_for_test())
    }
}
