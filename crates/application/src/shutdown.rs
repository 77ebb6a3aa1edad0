//! Cooperative cancellation for long-running passes.

use tokio::sync::watch;

/// Creates a linked trigger and signal.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownTrigger { sender },
        ShutdownSignal {
            receiver: Some(receiver),
        },
    )
}

/// Requests shutdown of every linked signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Marks shutdown as requested. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Observes a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    /// Returns a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { receiver: None }
    }

    /// Returns whether shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow())
    }

    /// Waits until shutdown is requested.
    ///
    /// A dropped trigger counts as a request.
    pub async fn wait(&mut self) {
        let Some(receiver) = self.receiver.as_mut() else {
            std::future::pending::<()>().await;
            return;
        };

        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_is_observed_by_every_clone() {
        let (trigger, signal) = shutdown_channel();
        let mut cloned = signal.clone();
        assert!(!signal.is_triggered());

        trigger.trigger();

        assert!(signal.is_triggered());
        cloned.wait().await;
        assert!(cloned.is_triggered());
    }

    #[tokio::test]
    async fn dropped_trigger_releases_waiters() {
        let (trigger, mut signal) = shutdown_channel();
        drop(trigger);
        signal.wait().await;
    }

    #[test]
    fn never_signal_stays_clear() {
        assert!(!ShutdownSignal::never().is_triggered());
    }
}
