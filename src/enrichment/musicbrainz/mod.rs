//! MusicBrainz API integration
//!
//! Resolves an artist name to genres using the artist search endpoint.
//! Search results carry community tags with vote counts, so a single request
//! is enough: no follow-up lookup by MBID is needed.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API/Search

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_result;
pub use client::{MusicBrainzClient, MusicBrainzConfig};
