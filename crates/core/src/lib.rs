//! Shared types for the Bistro notification pipeline.

pub mod channels;
pub mod types;
