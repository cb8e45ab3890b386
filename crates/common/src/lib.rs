//! Identifier types shared across the checkout workspace.

pub mod types;

pub use types::{SessionId, UserId};
