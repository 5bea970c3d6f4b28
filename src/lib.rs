//! # World Bench Curator
//!
//! Curates "world" scenarios for benchmarking action-conditioned image and
//! video generation models. A scenario is a directed graph of states (scene
//! descriptions) connected by actions, optionally enriched with a generated
//! image per state and a generated clip per transition.
//!
//! ## Features
//!
//! - **Graph Model**: states, actions and transitions with lazy structural validation
//! - **Path Analysis**: path enumeration, success/failure classification, decision points
//! - **Branch Expansion**: grows a linear scenario into a multi-ending world
//! - **Media Traversal**: parent-conditioned image rendering and connecting videos,
//!   checkpointed so interrupted runs resume
//!
//! ## Architecture
//!
//! ```text
//! TextAuthor ──▶ World ──▶ BranchExpander ──▶ World (branching)
//!                                                 │
//!                  ImageRenderer ◀── ImageWorldGenerator ──▶ ImageWorld
//!                  VideoRenderer ◀── VideoWorldGenerator ──▶ VideoWorld
//!                                          │
//!                                   CheckpointStore
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use world_bench_curator::media::{ImageSettings, ImageStrategy, ImageWorldGenerator};
//! use world_bench_curator::storage::MemoryCheckpointStore;
//! use world_bench_curator::world::World;
//!
//! let world = World::load("desk_branching.json").await?;
//! let generator = ImageWorldGenerator::new(
//!     renderer,
//!     Arc::new(MemoryCheckpointStore::new()),
//!     ImageSettings::from(&config.render),
//! );
//! let images = generator.generate(&world, ImageStrategy::FullWorld).await?;
//! images.save("desk_images.json").await?;
//! ```

/// Text authoring collaborator and its completion-backed implementation.
pub mod authoring;
/// HTTP client for the generation backend.
pub mod backend;
/// Command-line subcommands.
pub mod cli;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Branch expansion of linear worlds.
pub mod expansion;
/// Image and video traversal of worlds.
pub mod media;
/// Prompt templates for authoring and rendering.
pub mod prompts;
/// Image and video render collaborators.
pub mod render;
/// Checkpoint ledgers and JSON file helpers.
pub mod storage;
/// World graph model and path analysis.
pub mod world;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use world::World;
