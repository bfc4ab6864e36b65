// Step Signals
// Two-stage cancellation handed to every running step

use tokio_util::sync::CancellationToken;

/// Cancellation signals for a running step.
///
/// The first stage (`abort`) asks steps to unwind. Cleanup hooks that must
/// still run once a build is unwinding are given [`Signals::cleanup`], which
/// only observes the second stage (`kill`): a repeated abort or an expired
/// deadline. Killing always implies aborting.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    abort: CancellationToken,
    kill: CancellationToken,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancelled with this one, and on their own by `abort`/`kill`.
    pub fn child(&self) -> Self {
        Self {
            abort: self.abort.child_token(),
            kill: self.kill.child_token(),
        }
    }

    /// Signals for work that has to outlive an abort. Only a kill reaches them.
    pub fn cleanup(&self) -> Self {
        let stage = self.kill.child_token();
        Self {
            abort: stage.clone(),
            kill: stage,
        }
    }

    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn kill(&self) {
        self.kill.cancel();
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled() || self.kill.is_cancelled()
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Resolves once the step should stop.
    pub async fn aborted(&self) {
        tokio::select! {
            _ = self.abort.cancelled() => {}
            _ = self.kill.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_reaches_children_but_not_cleanup() {
        let signals = Signals::new();
        let child = signals.child();
        let cleanup = signals.cleanup();

        signals.abort();
        assert!(child.is_aborted());
        assert!(!child.is_killed());
        assert!(!cleanup.is_aborted());
    }

    #[test]
    fn test_kill_reaches_cleanup() {
        let signals = Signals::new();
        let cleanup = signals.child().cleanup();

        signals.abort();
        signals.kill();
        assert!(cleanup.is_aborted());
        assert!(signals.is_killed());
    }

    #[test]
    fn test_child_abort_stays_local() {
        let signals = Signals::new();
        let child = signals.child();
        child.abort();
        assert!(!signals.is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_resolves_on_kill() {
        let signals = Signals::new();
        signals.kill();
        signals.aborted().await;
    }
}
