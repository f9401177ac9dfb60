//! Conversation records

use serde::{Deserialize, Serialize};

use super::user::Sex;

/// Who wrote a message, seen from the session owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "received" => Some(Self::Received),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    /// Peer username
    pub username: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub city: Option<String>,
    pub avatar: Option<String>,
    /// Country flag image URL
    pub flag: Option<String>,
    pub online: bool,
    /// Thread marked as new by the site
    pub is_new: bool,
    /// Preview of the last message
    pub snippet: Option<String>,
    /// The session owner wrote the last message
    pub sent_last: bool,
    pub unread: bool,
}

/// A page of the conversation list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPage {
    pub chats: Vec<ThreadSummary>,
    /// Site-wide unread message counter
    pub unread: u32,
}

/// A message of a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: Option<String>,
    /// Username of the author
    pub sender: Option<String>,
    pub body: String,
    /// Day heading the message was listed under
    pub date: Option<String>,
    pub time: Option<String>,
    pub direction: Direction,
    pub unread: bool,
}
