use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

use crate::error::ChannelResult;
use crate::record::{ChatMessage, RawRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type SubscriptionWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One event observed on a channel subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A record was appended (or replayed on subscribe). Not yet validated.
    Appended(RawRecord),
    /// The backend reported a failure. The worker may reopen the stream
    /// afterwards; the event stream ends once it gives up.
    Error(String),
}

/// Receiving half of a channel subscription.
///
/// Dropping the subscription signals cancellation to its worker, so holding
/// it is what keeps the backend stream open.
pub struct MessageSubscription {
    channel_id: String,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// A subscription plus the future that drives it.
///
/// The caller decides where the worker runs (usually a tokio runtime).
pub struct SubscriptionHandle {
    pub subscription: MessageSubscription,
    pub worker: SubscriptionWorker,
}

impl MessageSubscription {
    pub(crate) fn new(
        channel_id: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Append-only realtime collection of chat records.
pub trait MessageChannel: Send + Sync {
    fn id(&self) -> &str;
    fn subscribe(&self) -> ChannelResult<SubscriptionHandle>;
    fn append(&self, message: ChatMessage) -> BoxFuture<'static, ChannelResult<()>>;
}

pub(crate) fn make_subscription(
    channel_id: &str,
) -> (
    mpsc::UnboundedSender<ChannelEvent>,
    MessageSubscription,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        MessageSubscription::new(channel_id, event_rx, cancel_tx),
        cancel_rx,
    )
}
