#![deny(unsafe_code)]

/// Desktop chat client: profile setup followed by a live shared chat room.
pub mod app;
/// Chat screen, message model, and composer.
pub mod chat;
/// Display name and avatar selection.
pub mod profile;
/// Settings persistence and channel selection.
pub mod settings;
