//! Shared types, error definitions, and utilities used across all handoff crates.

pub mod cache;
pub mod error;
pub mod types;

pub use {
    cache::{MemoryTtlStore, TtlStore},
    error::{Error, FromMessage, Result},
    types::{ConversationKey, PageInfo, Platform, unix_now},
};
