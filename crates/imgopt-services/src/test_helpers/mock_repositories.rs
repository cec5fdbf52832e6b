//! Mock repository implementations for testing

use anyhow::Result;
use async_trait::async_trait;
use imgopt_core::{
    AttachmentHistoryRepository, AttachmentRepository, DocumentRepository,
    MediaLibraryRepository, OptimizeError, OptimizeResult, SettingsProvider, SiteSettings,
};
use imgopt_core::{Attachment, AttachmentVersion, Document};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Media libraries keyed by id
#[derive(Clone, Default)]
pub struct InMemoryMediaLibraries {
    folders: Arc<Mutex<HashMap<i64, String>>>,
}

impl InMemoryMediaLibraries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&self, library_id: i64, folder: impl Into<String>) {
        self.folders
            .lock()
            .unwrap()
            .insert(library_id, folder.into());
    }
}

#[async_trait]
impl MediaLibraryRepository for InMemoryMediaLibraries {
    async fn library_folder(&self, library_id: i64) -> Result<Option<String>> {
        Ok(self.folders.lock().unwrap().get(&library_id).cloned())
    }
}

/// Persisted live attachments keyed by id
#[derive(Clone, Default)]
pub struct InMemoryAttachments {
    attachments: Arc<Mutex<HashMap<i64, Attachment>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_attachment(&self, attachment: Attachment) {
        self.attachments
            .lock()
            .unwrap()
            .insert(attachment.id, attachment);
    }

    /// Make every lookup fail
    pub fn fail_lookups(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttachmentRepository for InMemoryAttachments {
    async fn get_attachment(&self, attachment_id: i64) -> Result<Option<Attachment>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("attachment store unavailable");
        }
        Ok(self.attachments.lock().unwrap().get(&attachment_id).cloned())
    }
}

/// Attachment version history
#[derive(Clone, Default)]
pub struct InMemoryAttachmentHistory {
    versions: Arc<Mutex<Vec<AttachmentVersion>>>,
}

impl InMemoryAttachmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_version(&self, version: AttachmentVersion) {
        self.versions.lock().unwrap().push(version);
    }
}

#[async_trait]
impl AttachmentHistoryRepository for InMemoryAttachmentHistory {
    async fn latest_version(&self, attachment_guid: Uuid) -> Result<Option<AttachmentVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|version| version.attachment_guid == attachment_guid)
            .max_by_key(|version| version.last_modified)
            .cloned())
    }
}

/// Page documents keyed by id
#[derive(Clone, Default)]
pub struct InMemoryDocuments {
    documents: Arc<Mutex<HashMap<i64, Document>>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document);
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocuments {
    async fn get_document(&self, document_id: i64) -> Result<Option<Document>> {
        Ok(self.documents.lock().unwrap().get(&document_id).cloned())
    }
}

/// Settings provider whose reads always fail
#[derive(Debug, Clone, Default)]
pub struct FailingSettings;

impl SettingsProvider for FailingSettings {
    fn site_settings(&self, site_name: &str) -> OptimizeResult<SiteSettings> {
        Err(OptimizeError::Settings(format!(
            "settings store unavailable for {}",
            site_name
        )))
    }
}
