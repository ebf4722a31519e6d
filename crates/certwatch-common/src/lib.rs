//! Shared types and id generation for the certwatch workspace.

pub mod id;
pub mod types;
