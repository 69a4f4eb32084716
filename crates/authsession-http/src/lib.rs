//! HTTP implementations of the identity and permissions lookups.
//!
//! Provides:
//! - `HttpEndpoints` - where the lookups are sent
//! - `HttpIdentityFetcher` - `POST {"api_token": ...}` to the identity endpoint
//! - `HttpPermissionsFetcher` - bearer-authenticated `GET` of the current grants

pub mod client;

pub use client::{HttpEndpoints, HttpIdentityFetcher, HttpPermissionsFetcher};
