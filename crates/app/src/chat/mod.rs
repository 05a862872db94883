/// Event contracts for chat module wiring.
pub mod events;
/// Message log and row derivation.
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod view;

pub use events::{ProfileConfirmed, Submit};
pub use message::{Alignment, MessageLog, MessageRow, build_rows, classify, compose_outgoing};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use view::ChatView;
