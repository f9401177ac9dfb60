//! Album and picture records

use serde::{Deserialize, Serialize};

/// Album header as listed on a member's albums page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub aid: String,
    /// Owner of the album
    pub uid: u64,
    pub name: String,
    pub picture_count: Option<u32>,
    /// Creation date as displayed by the site
    pub created: Option<String>,
    /// Last update as displayed by the site
    pub updated: Option<String>,
    /// Cover thumbnail URLs
    pub thumbnails: Vec<String>,
}

/// One picture of an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    /// Full-size image URL
    pub src: String,
    /// 180x180 thumbnail URL
    pub thumbnail: String,
}
