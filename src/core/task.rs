// ─── Task plumbing ───
// Progress/log sink and cooperative cancellation shared by every install step.

use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::core::error::{LauncherError, LauncherResult};

/// Terminal result of an installation run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Completed,
    Cancelled,
}

/// Receives progress and log lines from a running installation.
///
/// Implementations must return quickly; the pipeline never waits on them.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, message: &str);

    fn on_log(&self, level: Level, message: &str);
}

/// Listener that forwards everything into `tracing`.
pub struct TracingProgress;

impl ProgressListener for TracingProgress {
    fn on_progress(&self, message: &str) {
        tracing::info!(target: "install_progress", "{}", message);
    }

    fn on_log(&self, _level: Level, _message: &str) {
        // Processor output is already logged by the executor itself.
    }
}

/// Listener that drops everything.
pub struct NoopProgress;

impl ProgressListener for NoopProgress {
    fn on_progress(&self, _message: &str) {}

    fn on_log(&self, _level: Level, _message: &str) {}
}

/// `throwIfCancelled` for a tokio-util token.
pub trait CancelExt {
    fn ensure_active(&self) -> LauncherResult<()>;
}

impl CancelExt for CancellationToken {
    fn ensure_active(&self) -> LauncherResult<()> {
        if self.is_cancelled() {
            Err(LauncherError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fold an internal result into the public outcome: cancellation becomes a
/// value, every other error stays an error.
pub fn into_outcome(result: LauncherResult<()>) -> LauncherResult<InstallOutcome> {
    match result {
        Ok(()) => Ok(InstallOutcome::Completed),
        Err(LauncherError::Cancelled) => Ok(InstallOutcome::Cancelled),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_active_fails_once_cancelled() {
        let token = CancellationToken::new();
        assert!(token.ensure_active().is_ok());
        token.cancel();
        assert!(token.ensure_active().unwrap_err().is_cancelled());
    }

    #[test]
    fn cancelled_error_maps_to_outcome() {
        assert_eq!(
            into_outcome(Err(LauncherError::Cancelled)).unwrap(),
            InstallOutcome::Cancelled
        );
        assert_eq!(into_outcome(Ok(())).unwrap(), InstallOutcome::Completed);
        assert!(into_outcome(Err(LauncherError::ProcessorExitNonZero(1))).is_err());
    }
}
