//! Host record system traits
//!
//! The optimizer does not own the content records it works on. The host system
//! implements these traits so the core can read the state it needs for byte
//! fetches and change detection without depending on the host's persistence
//! layer.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Attachment, AttachmentVersion, Document};

/// Lookup of media library properties
#[async_trait]
pub trait MediaLibraryRepository: Send + Sync {
    /// Folder of the library, relative to the site's media root
    async fn library_folder(&self, library_id: i64) -> Result<Option<String>>;
}

/// Access to persisted live attachments
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Currently persisted attachment with the given id, if any
    async fn get_attachment(&self, attachment_id: i64) -> Result<Option<Attachment>>;
}

/// Access to attachment version history
#[async_trait]
pub trait AttachmentHistoryRepository: Send + Sync {
    /// Most recent version sharing `attachment_guid`, by last modification time
    async fn latest_version(&self, attachment_guid: Uuid) -> Result<Option<AttachmentVersion>>;
}

/// Access to page documents
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn get_document(&self, document_id: i64) -> Result<Option<Document>>;
}
