use thiserror::Error;
use watch_logging::watch_info;

#[derive(Debug, Error)]
#[error("notification for {module} failed: {message}")]
pub struct NotifyError {
    pub module: String,
    pub message: String,
}

/// Receives every new or changed grade. Delivery and retries are up to the
/// implementation.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, module: &str, grade: &str) -> Result<(), NotifyError>;
}

/// Announces grades in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, module: &str, grade: &str) -> Result<(), NotifyError> {
        watch_info!("New Grade: {} - {}", module, grade);
        Ok(())
    }
}
