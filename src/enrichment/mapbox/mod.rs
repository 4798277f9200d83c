//! Mapbox Geocoding API (v5) integration
//!
//! Requires an access token. The state is the `region.*` entry in the
//! context hierarchy of the best `place` feature.
//!
//! API docs: https://docs.mapbox.com/api/search/geocoding-v5/

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_result;
pub use client::{MapboxClient, MapboxConfig};
