//! HTTP client for the generation backend.
//!
//! One client serves text completions, image generation, file uploads and
//! video jobs. Every call goes through the same retry loop with exponential
//! backoff.

mod client;
mod types;

pub use client::GenerationClient;
pub use types::*;
