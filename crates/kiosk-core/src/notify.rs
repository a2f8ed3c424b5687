use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A message queued for delivery to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Outbound delivery channel (email, SMS, ...). Best effort.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Development gateway: writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(recipient, subject, "Notification (log gateway)");
        debug!(recipient, body, "Notification body");
        Ok(())
    }
}

/// Fire-and-forget handle for queueing notifications.
///
/// `notify` never blocks and never fails; if the delivery task is gone the
/// message is dropped with a warning.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// A notifier and the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Start a delivery task on the current tokio runtime.
    pub fn spawn(gateway: Arc<dyn NotificationGateway>) -> (Self, JoinHandle<()>) {
        let (notifier, rx) = Self::channel();
        let handle = tokio::spawn(run_delivery_loop(rx, gateway));
        (notifier, handle)
    }

    /// A notifier with no delivery task. Every message is dropped.
    pub fn disconnected() -> Self {
        let (notifier, _rx) = Self::channel();
        notifier
    }

    pub fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            warn!(recipient = %e.0.recipient, "Notification dropped: delivery queue closed");
        }
    }
}

/// Drain the queue, delivering each message through `gateway`.
/// Failures are logged and skipped. Returns when every `Notifier` is dropped.
pub async fn run_delivery_loop(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    gateway: Arc<dyn NotificationGateway>,
) {
    while let Some(n) = rx.recv().await {
        match gateway.send(&n.recipient, &n.subject, &n.body).await {
            Ok(()) => debug!(recipient = %n.recipient, "Notification delivered"),
            Err(e) => warn!(recipient = %n.recipient, "Notification delivery failed: {:#}", e),
        }
    }

    info!("Notification delivery loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationGateway for Recorder {
        async fn send(&self, recipient: &str, _subject: &str, body: &str) -> anyhow::Result<()> {
            if body.contains("fail") {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(recipient.to_string());
            Ok(())
        }
    }

    fn note(recipient: &str, body: &str) -> Notification {
        Notification {
            recipient: recipient.into(),
            subject: "hello".into(),
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_delivery() {
        let gateway = Arc::new(Recorder::default());
        let (notifier, handle) = Notifier::spawn(gateway.clone());

        notifier.notify(note("a@example.com", "ok"));
        notifier.notify(note("b@example.com", "please fail"));
        notifier.notify(note("c@example.com", "ok"));
        drop(notifier);

        handle.await.unwrap();
        let sent = gateway.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["a@example.com", "c@example.com"]);
    }

    #[test]
    fn disconnected_notifier_drops_silently() {
        let notifier = Notifier::disconnected();
        notifier.notify(note("a@example.com", "ok"));
    }
}
