//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the
//! Port/Adapter (Hexagonal) architecture pattern:
//!
//! - [`StdFileops`] - the production filesystem adapter (`std::fs` +
//!   `statvfs`)
//! - [`MemFileops`] - an in-memory filesystem for tests
//! - [`FileConfigStore`] / [`MemConfigStore`] - bucket-sequence
//!   persistence

mod config_store;
mod fs;
mod memfs;

pub use config_store::{FileConfigStore, MemConfigStore};
pub use fs::StdFileops;
pub use memfs::MemFileops;
