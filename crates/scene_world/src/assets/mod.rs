//! Asset management system
//!
//! Loaded assets are ordinary entities in an [`AssetManager`](crate::ecs::AssetManager)
//! world; this module supplies the background loader that parses their
//! payloads off the owning thread.

pub mod loader;

pub use loader::{AssetLoader, CancellationToken, DrainReport, LoadError, LoadHandle, LoadStatus};
