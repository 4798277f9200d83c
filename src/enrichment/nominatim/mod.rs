//! OpenStreetMap Nominatim integration
//!
//! Free geocoder, no key required. The usage policy asks for an identifying
//! User-Agent and at most one request per second.
//!
//! API docs: https://nominatim.org/release-docs/develop/api/Search/

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_result;
pub use client::{NominatimClient, NominatimConfig};
