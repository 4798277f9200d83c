//! Last.fm API integration
//!
//! `artist.getinfo` returns the artist's top user tags, which double as
//! genres. Errors arrive as `{"error": <code>, "message": ...}` bodies, with
//! or without a matching HTTP status.
//!
//! API docs: https://www.last.fm/api/show/artist.getInfo

pub mod dto;
mod adapter;
mod client;

pub use adapter::{error_result, to_result};
pub use client::{LastFmClient, LastFmConfig};
