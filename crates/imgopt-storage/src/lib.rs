//! imgopt Storage Library
//!
//! Byte storage used when an asset record does not carry its payload in
//! memory and the file has to be read back from site storage.
//!
//! # Storage key format
//!
//! Keys are site-scoped. All backends use the same layout:
//!
//! - **Media library files**: `sites/{site}/media/{library_folder}/{file_path}`
//! - **Meta files**: `sites/{site}/metafiles/{guid}{extension}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so all backends stay consistent.

pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use keys::{media_file_key, meta_file_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageError, StorageResult};
