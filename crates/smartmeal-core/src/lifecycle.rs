//! App lifecycle and navigation events consumed by the auth flow.
//!
//! Front ends publish into a [`LifecycleHub`]; the flow controller holds a
//! [`LifecycleSubscription`] while it runs and drops it on teardown.

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The embedded browser is about to load `url`.
    NavigationIntercepted(String),
    /// The OS routed a deep link into the app.
    DeepLink(String),
    /// The app returned to the foreground, possibly with a pending URL.
    Resumed { callback_url: Option<String> },
    /// The user pasted a callback URL or code.
    ManualCode(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct LifecycleHub {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Default for LifecycleHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LifecycleHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to current subscribers; returns how many received it.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> LifecycleSubscription {
        LifecycleSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Active subscription; unsubscribes when dropped.
#[derive(Debug)]
pub struct LifecycleSubscription {
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl LifecycleSubscription {
    /// Next event, or `None` once every hub handle is gone.
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Lifecycle subscriber lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
