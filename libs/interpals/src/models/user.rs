//! Member records

use common::InterpalsResult;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::api::Api;

/// Sex as shown on profiles and in search filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Value used by the site in search parameters and image names
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form profile section such as "About me" or "Hobbies"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSection {
    pub title: String,
    pub text: String,
}

/// Member profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub uid: u64,
    /// Display name
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub city: Option<String>,
    pub city_code: Option<String>,
    pub country: Option<String>,
    /// Two-letter country code
    pub country_code: Option<String>,
    pub online: bool,
    /// "Last seen" text when the member is offline
    pub last_seen: Option<String>,
    pub joined: Option<String>,
    pub updated: Option<String>,
    pub status: Option<String>,
    pub avatar: Option<String>,
    pub sections: Vec<ProfileSection>,
}

/// Member as listed in search results and friend lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub avatar: Option<String>,
    pub online: bool,
}

impl UserSummary {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            age: None,
            city: None,
            avatar: None,
            online: false,
        }
    }
}

/// A member known by username whose `uid` is looked up on demand
#[derive(Debug, Clone, Default)]
pub struct UserRef {
    username: String,
    uid: OnceCell<u64>,
}

impl UserRef {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uid: OnceCell::new(),
        }
    }

    /// Reference whose `uid` is already known
    pub fn with_uid(username: impl Into<String>, uid: u64) -> Self {
        Self {
            username: username.into(),
            uid: OnceCell::new_with(Some(uid)),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The `uid` if it was already resolved
    pub fn cached_uid(&self) -> Option<u64> {
        self.uid.get().copied()
    }

    /// Resolve the `uid` through `api`, at most once per reference
    pub async fn uid(&self, api: &Api<'_>) -> InterpalsResult<u64> {
        self.uid
            .get_or_try_init(|| api.get_uid(&self.username))
            .await
            .copied()
    }
}

impl PartialEq for UserRef {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for UserRef {}

impl From<&str> for UserRef {
    fn from(username: &str) -> Self {
        Self::new(username)
    }
}
