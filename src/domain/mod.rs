//! Domain Layer
//!
//! Port abstractions the core depends on, following the Port/Adapter
//! (Hexagonal) pattern:
//!
//! - **Fileops** - the primitive filesystem capability (stat, readlink,
//!   copy, rename, free-space query) consumed by every component that
//!   touches disk
//! - **ConfigStore** - persistence for the bucket-sequence string
//!
//! Infrastructure adapters in [`crate::adapters`] implement these traits;
//! tests substitute an in-memory filesystem.

pub mod ports;

pub use ports::{ConfigStore, Fileops, VolumeSpace};
