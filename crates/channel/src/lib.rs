//! Realtime message channel used by the chat client.
//!
//! A channel is an append-only collection of [`ChatMessage`] records that can be
//! subscribed to (history replay followed by live appends) and appended to.
use std::sync::Arc;

mod channel;
mod config;
mod error;
mod firebase;
mod memory;
mod record;
mod sse;

pub use channel::{
    BoxFuture, ChannelEvent, MessageChannel, MessageSubscription, SubscriptionHandle,
    SubscriptionWorker,
};
pub use config::{ChannelConfig, MESSAGES_PATH};
pub use error::{ChannelError, ChannelResult};
pub use firebase::{ChildFeed, FIREBASE_CHANNEL_ID, FeedUpdate, RealtimeDatabaseChannel};
pub use memory::{LOCAL_CHANNEL_ID, LocalChannel};
pub use record::{ChatMessage, DEFAULT_AVATAR, RawRecord};
pub use sse::{SseDecoder, SseFrame};

/// Builds the channel client named by `channel_id`.
///
/// An empty id selects the Firebase backend.
pub fn create_channel(
    channel_id: &str,
    config: ChannelConfig,
) -> ChannelResult<Arc<dyn MessageChannel>> {
    match channel_id.trim() {
        "" | FIREBASE_CHANNEL_ID => Ok(Arc::new(RealtimeDatabaseChannel::new(config)?)),
        LOCAL_CHANNEL_ID => Ok(Arc::new(LocalChannel::new())),
        other => Err(ChannelError::UnsupportedChannel {
            stage: "create-channel",
            channel_id: other.to_string(),
        }),
    }
}
