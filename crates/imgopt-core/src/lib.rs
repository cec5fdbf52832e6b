//! imgopt Core Library
//!
//! This crate provides the asset models, settings snapshot, error types and
//! host-system traits shared by every imgopt component.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::{EnvSettings, InMemorySettings, SettingsProvider, SiteSettings};
pub use error::{LogLevel, OptimizeError, OptimizeResult};
pub use hooks::{
    AttachmentHistoryRepository, AttachmentRepository, DocumentRepository,
    MediaLibraryRepository,
};
pub use models::{
    AssetKind, AssetMut, AssetRef, Attachment, AttachmentVersion, Document, MediaFile,
    MetaFile, WorkflowStep,
};
