//! Test helpers for optimizer and interceptor tests
//!
//! In-memory host repositories, record and image fixtures, and recorders for
//! notifications and pipeline invocations. No host system is needed.

pub mod fixtures;
pub mod mock_repositories;
pub mod recorders;

pub use fixtures::*;
pub use mock_repositories::*;
pub use recorders::*;
