pub use chirp_channel::{ChatMessage, DEFAULT_AVATAR, RawRecord};
use chirp_channel::{BoxFuture, ChannelResult, MessageChannel};

use crate::profile::LocalProfile;

/// Which side of the conversation a message is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    Sent,
    Received,
}

/// Classifies by plain string equality with the local display name.
///
/// Names are free text and unauthenticated, so two users picking the same
/// name both see each other's messages as sent.
pub fn classify(message: &ChatMessage, local_name: &str) -> Alignment {
    if message.sender == local_name {
        Alignment::Sent
    } else {
        Alignment::Received
    }
}

/// Builds the record for an outgoing message, or `None` for blank input.
///
/// The text is sent as typed; only the emptiness check trims it.
pub fn compose_outgoing(profile: &LocalProfile, text: &str) -> Option<ChatMessage> {
    if text.trim().is_empty() {
        return None;
    }

    let avatar = if profile.avatar_url.is_empty() {
        DEFAULT_AVATAR
    } else {
        profile.avatar_url.as_str()
    };

    Some(ChatMessage::new(profile.name.clone(), text, avatar))
}

/// Starts the channel write for submitted text. Blank text never reaches the channel.
pub fn send_outgoing(
    channel: &dyn MessageChannel,
    profile: &LocalProfile,
    text: &str,
) -> Option<BoxFuture<'static, ChannelResult<()>>> {
    compose_outgoing(profile, text).map(|message| channel.append(message))
}

/// Ordered, append-only sequence of received messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a received record when it carries both sender and message.
    pub fn accept(&mut self, record: RawRecord) -> Option<&ChatMessage> {
        let message = record.into_message()?;
        self.messages.push(message);
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Render-ready view of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub alignment: Alignment,
    pub sender: String,
    pub text: String,
    pub avatar: String,
}

impl MessageRow {
    pub fn new(message: &ChatMessage, local_name: &str) -> Self {
        Self {
            alignment: classify(message, local_name),
            sender: message.sender.clone(),
            text: message.message.clone(),
            avatar: message.avatar().to_string(),
        }
    }
}
