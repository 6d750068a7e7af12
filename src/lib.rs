#![forbid(unsafe_code)]

//! Video metadata API: single-video lookups, suggestions, like/dislike
//! counters, and uploads backed by a hosted media service.
//!
//! The binary in `src/bin/backend.rs` wires these modules together; tests
//! drive the same router in-process.

pub mod api;
pub mod config;
pub mod error;
pub mod library;
pub mod reaction;
pub mod store;
pub mod upload;
pub mod video;
