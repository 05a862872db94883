use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Avatar reference used when a message carries no avatar of its own.
pub const DEFAULT_AVATAR: &str = "default-avatar.png";

/// One user-authored chat record as stored on the channel.
///
/// Records are created by the sending client and never mutated afterwards.
/// There is no message id: identity is the position in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    #[serde(rename = "profilePic", default)]
    pub profile_pic: String,
}

impl ChatMessage {
    pub fn new(
        sender: impl Into<String>,
        message: impl Into<String>,
        profile_pic: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
            profile_pic: profile_pic.into(),
        }
    }

    /// Returns the avatar to render, falling back to [`DEFAULT_AVATAR`].
    pub fn avatar(&self) -> &str {
        if self.profile_pic.is_empty() {
            DEFAULT_AVATAR
        } else {
            &self.profile_pic
        }
    }
}

/// A record as delivered by the backend, before validation.
///
/// Every field is optional because the channel accepts writes from any
/// client and nothing enforces the record shape server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub sender: Option<String>,
    pub message: Option<String>,
    pub profile_pic: Option<String>,
}

impl RawRecord {
    /// Reads a record from an arbitrary JSON value, one field at a time.
    ///
    /// `sender` and `message` follow JavaScript truthiness: falsy values
    /// (`null`, `false`, `0`, `""`) are absent, any other value is kept as
    /// text. A `profilePic` that is not a string is treated as absent.
    /// Values that are not objects yield an empty record.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };

        Self {
            sender: fields.remove("sender").and_then(truthy_text),
            message: fields.remove("message").and_then(truthy_text),
            profile_pic: match fields.remove("profilePic") {
                Some(Value::String(profile_pic)) => Some(profile_pic),
                _ => None,
            },
        }
    }

    /// Converts into a [`ChatMessage`] when both `sender` and `message` are present
    /// and non-empty. Whitespace-only values count as present.
    pub fn into_message(self) -> Option<ChatMessage> {
        let sender = self.sender.filter(|sender| !sender.is_empty())?;
        let message = self.message.filter(|message| !message.is_empty())?;

        Some(ChatMessage {
            sender,
            message,
            profile_pic: self.profile_pic.unwrap_or_default(),
        })
    }
}

fn truthy_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text),
        other @ (Value::Array(_) | Value::Object(_)) => Some(other.to_string()),
    }
}

impl From<ChatMessage> for RawRecord {
    fn from(message: ChatMessage) -> Self {
        Self {
            sender: Some(message.sender),
            message: Some(message.message),
            profile_pic: Some(message.profile_pic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_wire_field_names() {
        let message = ChatMessage::new("Bob", "hi", "https://example.test/a.svg");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(
            value,
            json!({
                "sender": "Bob",
                "message": "hi",
                "profilePic": "https://example.test/a.svg",
            })
        );
    }

    #[test]
    fn record_without_message_is_rejected() {
        let record = RawRecord::from_value(json!({ "sender": "Dave" }));
        assert_eq!(record.into_message(), None);
    }

    #[test]
    fn record_with_empty_sender_is_rejected() {
        let record = RawRecord::from_value(json!({ "sender": "", "message": "yo" }));
        assert_eq!(record.into_message(), None);
    }

    #[test]
    fn whitespace_only_text_counts_as_present() {
        let record = RawRecord::from_value(json!({ "sender": "Carol", "message": " " }));
        let message = record.into_message().unwrap();
        assert_eq!(message.message, " ");
    }

    #[test]
    fn missing_profile_pic_falls_back_to_default_avatar() {
        let record = RawRecord::from_value(json!({ "sender": "Carol", "message": "yo" }));
        let message = record.into_message().unwrap();

        assert_eq!(message.profile_pic, "");
        assert_eq!(message.avatar(), DEFAULT_AVATAR);
    }

    #[test]
    fn non_object_values_become_invalid_records() {
        assert_eq!(RawRecord::from_value(json!("hello")).into_message(), None);
        assert_eq!(RawRecord::from_value(json!(null)).into_message(), None);
        assert_eq!(RawRecord::from_value(json!([1, 2])).into_message(), None);
    }

    #[test]
    fn wrong_typed_avatar_keeps_the_record() {
        for profile_pic in [json!(5), json!(false), json!({ "url": "x" }), json!(null)] {
            let record = RawRecord::from_value(json!({
                "sender": "Carol",
                "message": "yo",
                "profilePic": profile_pic,
            }));
            let message = record.into_message().unwrap();

            assert_eq!(message, ChatMessage::new("Carol", "yo", ""));
            assert_eq!(message.avatar(), DEFAULT_AVATAR);
        }
    }

    #[test]
    fn truthy_non_string_fields_are_kept_as_text() {
        let message = RawRecord::from_value(json!({ "sender": 7, "message": true }))
            .into_message()
            .unwrap();

        assert_eq!(message.sender, "7");
        assert_eq!(message.message, "true");
    }

    #[test]
    fn falsy_fields_drop_the_record() {
        for falsy in [json!(0), json!(false), json!(null), json!("")] {
            let record = RawRecord::from_value(json!({ "sender": "Dave", "message": falsy }));
            assert_eq!(record.into_message(), None);
        }
    }
}
