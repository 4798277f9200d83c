//! Spotify Web API integration
//!
//! Uses the client-credentials flow: the app's client ID and secret are
//! exchanged for a bearer token, which is cached and reused until shortly
//! before it expires. Artist objects carry a `genres` list directly.
//!
//! API docs: https://developer.spotify.com/documentation/web-api

pub mod dto;
mod adapter;
mod client;
mod token;

pub use adapter::to_result;
pub use client::{SpotifyClient, SpotifyConfig};
