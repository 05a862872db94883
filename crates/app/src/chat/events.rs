use crate::profile::LocalProfile;

/// Emitted when the user submits text from the message input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Emitted once the profile form passes validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfirmed {
    pub profile: LocalProfile,
}
