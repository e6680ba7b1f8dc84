//! HTTP request handlers for the kbchat web server

pub mod chat;
pub mod chats;
pub mod company;
pub mod documents;
pub mod health;
pub mod types;

pub use chat::*;
pub use chats::*;
pub use company::*;
pub use documents::*;
pub use health::*;

// Re-export all types for convenience
pub use types::*;
