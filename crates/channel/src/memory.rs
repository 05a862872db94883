use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::channel::{
    BoxFuture, ChannelEvent, MessageChannel, SubscriptionHandle, SubscriptionWorker,
    make_subscription,
};
use crate::error::{ChannelResult, ClosedSnafu};
use crate::record::ChatMessage;

pub const LOCAL_CHANNEL_ID: &str = "local";

/// Process-local message channel.
///
/// Keeps every appended record and replays the full history to each new
/// subscriber before forwarding live appends, matching what the realtime
/// backend does for a fresh connection.
#[derive(Clone, Default)]
pub struct LocalChannel {
    inner: Arc<Mutex<LocalChannelState>>,
}

#[derive(Default)]
struct LocalChannelState {
    history: Vec<ChatMessage>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
    next_subscriber_id: u64,
    closed: bool,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel that already holds `history`.
    pub fn with_history(history: impl IntoIterator<Item = ChatMessage>) -> Self {
        let channel = Self::new();
        channel.state().history.extend(history);
        channel
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.state().history.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Rejects further appends and ends every open subscription.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.subscribers.clear();
    }

    fn state(&self) -> MutexGuard<'_, LocalChannelState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self, subscriber_id: u64) {
        if self.state().subscribers.remove(&subscriber_id).is_some() {
            tracing::debug!(
                channel_id = LOCAL_CHANNEL_ID,
                subscriber_id,
                "local subscription released"
            );
        }
    }
}

impl MessageChannel for LocalChannel {
    fn id(&self) -> &str {
        LOCAL_CHANNEL_ID
    }

    fn subscribe(&self) -> ChannelResult<SubscriptionHandle> {
        let (event_tx, subscription, cancel_rx) = make_subscription(LOCAL_CHANNEL_ID);

        let subscriber_id = {
            let mut state = self.state();
            if state.closed {
                return ClosedSnafu {
                    stage: "local-subscribe",
                }
                .fail();
            }

            // Replay under the lock so no append can slip between history and live delivery.
            for message in &state.history {
                let _ = event_tx.send(ChannelEvent::Appended(message.clone().into()));
            }

            let subscriber_id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.subscribers.insert(subscriber_id, event_tx);
            subscriber_id
        };

        let channel = self.clone();
        let worker: SubscriptionWorker = Box::pin(async move {
            let _ = cancel_rx.await;
            channel.detach(subscriber_id);
        });

        Ok(SubscriptionHandle {
            subscription,
            worker,
        })
    }

    fn append(&self, message: ChatMessage) -> BoxFuture<'static, ChannelResult<()>> {
        let channel = self.clone();

        Box::pin(async move {
            let mut state = channel.state();
            if state.closed {
                return ClosedSnafu {
                    stage: "local-append",
                }
                .fail();
            }

            state.history.push(message.clone());
            state.subscribers.retain(|_, event_tx| {
                event_tx
                    .send(ChannelEvent::Appended(message.clone().into()))
                    .is_ok()
            });

            Ok(())
        })
    }
}
