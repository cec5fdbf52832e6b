//! Record lifecycle interception
//!
//! The host calls [`ChangeInterceptor::before_save`] right before it persists
//! a media file, meta file, attachment or attachment version. Media and meta
//! files are always handed to the optimizer. Attachments are only optimized
//! when their bytes changed, judged by comparing sizes with the previously
//! stored record, so an already optimized payload is not processed again.

use imgopt_core::{
    AssetKind, AssetMut, Attachment, AttachmentHistoryRepository, AttachmentRepository,
    AttachmentVersion, DocumentRepository, MediaFile, MetaFile,
};
use std::fmt;
use std::sync::Arc;

use crate::optimizer::{ImageOptimizer, OptimizerContext};

/// Host lifecycle points the interceptor binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    MediaFileInsert,
    MediaFileUpdate,
    AttachmentInsert,
    AttachmentUpdate,
    MetaFileInsert,
    MetaFileUpdate,
    AttachmentVersionInsert,
}

impl LifecycleHook {
    pub const ALL: [LifecycleHook; 7] = [
        LifecycleHook::MediaFileInsert,
        LifecycleHook::MediaFileUpdate,
        LifecycleHook::AttachmentInsert,
        LifecycleHook::AttachmentUpdate,
        LifecycleHook::MetaFileInsert,
        LifecycleHook::MetaFileUpdate,
        LifecycleHook::AttachmentVersionInsert,
    ];

    /// Kind of record saved at this hook
    pub fn asset_kind(self) -> AssetKind {
        match self {
            LifecycleHook::MediaFileInsert | LifecycleHook::MediaFileUpdate => {
                AssetKind::MediaFile
            }
            LifecycleHook::AttachmentInsert | LifecycleHook::AttachmentUpdate => {
                AssetKind::Attachment
            }
            LifecycleHook::MetaFileInsert | LifecycleHook::MetaFileUpdate => AssetKind::MetaFile,
            LifecycleHook::AttachmentVersionInsert => AssetKind::AttachmentVersion,
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleHook::MediaFileInsert => "media_file.insert",
            LifecycleHook::MediaFileUpdate => "media_file.update",
            LifecycleHook::AttachmentInsert => "attachment.insert",
            LifecycleHook::AttachmentUpdate => "attachment.update",
            LifecycleHook::MetaFileInsert => "meta_file.insert",
            LifecycleHook::MetaFileUpdate => "meta_file.update",
            LifecycleHook::AttachmentVersionInsert => "attachment_version.insert",
        };
        f.write_str(name)
    }
}

/// Connects host save hooks to the optimizer
#[derive(Clone)]
pub struct ChangeInterceptor {
    context: OptimizerContext,
    attachments: Arc<dyn AttachmentRepository>,
    attachment_history: Arc<dyn AttachmentHistoryRepository>,
    documents: Arc<dyn DocumentRepository>,
}

impl ChangeInterceptor {
    pub fn new(
        context: OptimizerContext,
        attachments: Arc<dyn AttachmentRepository>,
        attachment_history: Arc<dyn AttachmentHistoryRepository>,
        documents: Arc<dyn DocumentRepository>,
    ) -> Self {
        Self {
            context,
            attachments,
            attachment_history,
            documents,
        }
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn optimizer(&self, site_name: &str) -> ImageOptimizer {
        ImageOptimizer::new(site_name, self.context.clone())
    }

    /// Entry point for every hook. A hook fired without a record, or with a
    /// record of another kind, is ignored.
    pub async fn before_save(
        &self,
        hook: LifecycleHook,
        site_name: &str,
        asset: Option<AssetMut<'_>>,
    ) {
        let Some(asset) = asset else {
            tracing::debug!(hook = %hook, "Lifecycle hook fired without a record");
            return;
        };

        if asset.kind() != hook.asset_kind() {
            tracing::warn!(
                hook = %hook,
                kind = %asset.kind(),
                "Lifecycle hook fired with a record of another kind"
            );
            return;
        }

        match asset {
            AssetMut::MediaFile(file) => self.media_file_saving(site_name, file).await,
            AssetMut::MetaFile(file) => self.meta_file_saving(site_name, file).await,
            AssetMut::Attachment(attachment) => {
                self.attachment_saving(site_name, attachment).await
            }
            AssetMut::AttachmentVersion(version) => {
                self.attachment_version_inserting(site_name, version).await
            }
        }
    }

    pub async fn media_file_saving(&self, site_name: &str, file: &mut MediaFile) {
        self.optimizer(site_name).optimize(file).await;
    }

    pub async fn meta_file_saving(&self, site_name: &str, file: &mut MetaFile) {
        self.optimizer(site_name).optimize(file).await;
    }

    /// Workflow path: compare with the most recent version of the attachment
    pub async fn attachment_version_inserting(
        &self,
        site_name: &str,
        version: &mut AttachmentVersion,
    ) {
        let previous = match self
            .attachment_history
            .latest_version(version.attachment_guid)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    guid = %version.attachment_guid,
                    "Failed to load attachment history, skipping image optimization"
                );
                return;
            }
        };

        if let Some(previous) = previous {
            if previous.attachment_size == version.attachment_size {
                tracing::debug!(
                    guid = %version.attachment_guid,
                    size = version.attachment_size,
                    "Attachment version unchanged, skipping image optimization"
                );
                return;
            }
        }

        self.optimizer(site_name).optimize(version).await;
    }

    /// Non-workflow path: compare with the persisted attachment, unless the
    /// owning document waits in a workflow step
    pub async fn attachment_saving(&self, site_name: &str, attachment: &mut Attachment) {
        let document = match self.documents.get_document(attachment.document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                tracing::warn!(
                    document_id = attachment.document_id,
                    guid = %attachment.guid,
                    "Owning document not found, skipping image optimization"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    document_id = attachment.document_id,
                    "Failed to load owning document, skipping image optimization"
                );
                return;
            }
        };

        if document.has_pending_workflow() {
            tracing::debug!(
                document_id = document.id,
                "Document has a pending workflow step, skipping image optimization"
            );
            return;
        }

        let existing = match self.attachments.get_attachment(attachment.id).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attachment_id = attachment.id,
                    "Failed to load persisted attachment, skipping image optimization"
                );
                return;
            }
        };

        if let Some(existing) = existing {
            if existing.attachment_size == attachment.attachment_size {
                tracing::debug!(
                    attachment_id = attachment.id,
                    size = attachment.attachment_size,
                    "Attachment unchanged, skipping image optimization"
                );
                return;
            }
        }

        self.optimizer(site_name).optimize(attachment).await;
    }
}
