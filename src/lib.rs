//! MediaShard - Multi-Volume Recording Store
//!
//! Spreads a large, continuously growing collection of recorded media
//! files across several independently mounted storage volumes while
//! presenting them as one logical directory tree. Physical placement is
//! hidden behind symlinks; callers only ever see the logical tree.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         MediaShard                             │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐      │
//! │  │  Classifier  │───▶│  Equalizer   │───▶│  Work Queue  │      │
//! │  │ (name → key) │    │ (key → vol)  │    │ (slow moves) │      │
//! │  └──────────────┘    └──────────────┘    └──────────────┘      │
//! │          ▲                                      ▲              │
//! │          └───────────── MediaDir ───────────────┘              │
//! │                      (the façade)                              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every recording name maps deterministically onto one symbol of a
//! 36-symbol alphabet; the equalizer assigns contiguous alphabet ranges
//! to volumes and rebuilds the assignment when a volume runs low on
//! space. File content is only ever moved by background workers.
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`classifier`] - Name to partition-key mapping
//! - [`config`] - Store configuration
//! - [`domain`] - Domain layer with ports (DDD)
//! - [`equalizer`] - Partition table and rebalancing
//! - [`error`] - Error types
//! - [`facade`] - The `MediaDir` entry point and the command console
//! - [`flatten`] - Storage-safe flat names and payload detection
//! - [`queue`] - Bounded background task queue

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod equalizer;
pub mod error;
pub mod facade;
pub mod flatten;
pub mod queue;

// Re-export commonly used types
pub use config::StoreConfig;
pub use equalizer::{Equalizer, PartitionTable};
pub use error::{Error, Result};
pub use facade::{ImportOutcome, MediaDir};
pub use queue::{Task, WorkQueue};
