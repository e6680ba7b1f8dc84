//! Request and response types shared by the handlers

pub mod chat;
pub mod common;
pub mod company;
pub mod documents;

pub use chat::*;
pub use common::*;
pub use company::*;
pub use documents::*;
