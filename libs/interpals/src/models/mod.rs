//! Records returned by the client

pub mod album;
pub mod chat;
pub mod user;

// Re-export for convenience
pub use album::{Album, Picture};
pub use chat::{ChatPage, Direction, Message, ThreadSummary};
pub use user::{Profile, ProfileSection, Sex, UserRef, UserSummary};
