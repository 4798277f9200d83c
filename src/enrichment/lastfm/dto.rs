//! Last.fm API Data Transfer Objects
//!
//! The JSON format is a mechanical translation of the XML API, so shapes
//! vary with cardinality: an artist with one tag gets an object instead of
//! a list, and an artist with none gets an empty string.
//! DO NOT use these types outside the lastfm module - convert to domain types.

use serde::{Deserialize, Serialize};

/// Either an error envelope or the artist info
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GetInfoResponse {
    Error(ApiError),
    Info(ArtistInfoEnvelope),
}

/// Error envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    /// Numeric code, see https://www.last.fm/api/errorcodes
    pub error: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistInfoEnvelope {
    pub artist: ArtistInfo,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistInfo {
    pub name: String,
    pub mbid: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

/// `{"tag": ...}` or `""`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Tags {
    List {
        #[serde(default)]
        tag: TagList,
    },
    Empty(String),
}

impl Default for Tags {
    fn default() -> Self {
        Tags::Empty(String::new())
    }
}

/// One tag object or a list of them
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TagList {
    Many(Vec<Tag>),
    One(Tag),
}

impl Default for TagList {
    fn default() -> Self {
        TagList::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tag {
    pub name: String,
    pub url: Option<String>,
}

impl Tags {
    /// Tags in the order Last.fm ranked them
    pub fn as_slice(&self) -> &[Tag] {
        match self {
            Tags::List {
                tag: TagList::Many(tags),
            } => tags,
            Tags::List {
                tag: TagList::One(tag),
            } => std::slice::from_ref(tag),
            Tags::Empty(_) => &[],
        }
    }
}
