//! Google Geocoding API integration
//!
//! Requires an API key. The service reports errors in a `status` field of a
//! 200 response rather than through HTTP status codes, so the adapter maps
//! that field onto the provider error taxonomy.
//!
//! API docs: https://developers.google.com/maps/documentation/geocoding/requests-geocoding

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_result;
pub use client::{GoogleClient, GoogleConfig};
