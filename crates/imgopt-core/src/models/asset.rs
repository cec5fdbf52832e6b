use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{OptimizeError, OptimizeResult};

/// Asset kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    MediaFile,
    MetaFile,
    Attachment,
    AttachmentVersion,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::MediaFile => "media file",
            AssetKind::MetaFile => "meta file",
            AssetKind::Attachment => "attachment",
            AssetKind::AttachmentVersion => "attachment version",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File stored in a media library.
///
/// `file_binary` is only populated for new uploads and updates that replace
/// the file; existing files are read back from library storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: i64,
    pub guid: Uuid,
    pub library_id: i64,
    pub file_name: String,
    pub file_extension: String,
    /// Path of the file relative to the library folder
    pub file_path: String,
    pub file_mime_type: String,
    pub file_size: i64,
    #[serde(skip)]
    pub file_binary: Option<Vec<u8>>,
    pub modified_at: DateTime<Utc>,
}

/// Auxiliary file attached to an arbitrary object (thumbnails, icons, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub id: i64,
    pub guid: Uuid,
    pub object_id: i64,
    pub object_type: String,
    pub meta_file_name: String,
    pub meta_file_extension: String,
    pub meta_file_mime_type: String,
    pub meta_file_size: i32,
    #[serde(skip)]
    pub meta_file_binary: Option<Vec<u8>>,
}

/// Live page attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub guid: Uuid,
    pub document_id: i64,
    pub attachment_name: String,
    pub attachment_extension: String,
    pub attachment_mime_type: String,
    pub attachment_size: i32,
    #[serde(skip)]
    pub attachment_binary: Option<Vec<u8>>,
    pub last_modified: DateTime<Utc>,
}

/// Historical version of a page attachment, written when workflow is enabled.
///
/// Versions of the same attachment share `attachment_guid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentVersion {
    pub history_id: i64,
    pub attachment_guid: Uuid,
    pub document_id: i64,
    pub attachment_name: String,
    pub attachment_extension: String,
    pub attachment_mime_type: String,
    pub attachment_size: i32,
    #[serde(skip)]
    pub attachment_binary: Option<Vec<u8>>,
    pub last_modified: DateTime<Utc>,
}

/// Shared borrow of exactly one asset record, as handed to observers.
#[derive(Debug, Clone, Copy)]
pub enum AssetRef<'a> {
    MediaFile(&'a MediaFile),
    MetaFile(&'a MetaFile),
    Attachment(&'a Attachment),
    AttachmentVersion(&'a AttachmentVersion),
}

impl<'a> AssetRef<'a> {
    pub fn kind(self) -> AssetKind {
        match self {
            AssetRef::MediaFile(_) => AssetKind::MediaFile,
            AssetRef::MetaFile(_) => AssetKind::MetaFile,
            AssetRef::Attachment(_) => AssetKind::Attachment,
            AssetRef::AttachmentVersion(_) => AssetKind::AttachmentVersion,
        }
    }

    /// Versions report the guid of the attachment they belong to
    pub fn guid(self) -> Uuid {
        match self {
            AssetRef::MediaFile(file) => file.guid,
            AssetRef::MetaFile(file) => file.guid,
            AssetRef::Attachment(attachment) => attachment.guid,
            AssetRef::AttachmentVersion(version) => version.attachment_guid,
        }
    }

    pub fn name(self) -> &'a str {
        match self {
            AssetRef::MediaFile(file) => &file.file_name,
            AssetRef::MetaFile(file) => &file.meta_file_name,
            AssetRef::Attachment(attachment) => &attachment.attachment_name,
            AssetRef::AttachmentVersion(version) => &version.attachment_name,
        }
    }

    pub fn extension(self) -> &'a str {
        match self {
            AssetRef::MediaFile(file) => &file.file_extension,
            AssetRef::MetaFile(file) => &file.meta_file_extension,
            AssetRef::Attachment(attachment) => &attachment.attachment_extension,
            AssetRef::AttachmentVersion(version) => &version.attachment_extension,
        }
    }

    pub fn size(self) -> i64 {
        match self {
            AssetRef::MediaFile(file) => file.file_size,
            AssetRef::MetaFile(file) => file.meta_file_size.into(),
            AssetRef::Attachment(attachment) => attachment.attachment_size.into(),
            AssetRef::AttachmentVersion(version) => version.attachment_size.into(),
        }
    }

    /// Bytes held by the record, if any
    pub fn binary(self) -> Option<&'a [u8]> {
        match self {
            AssetRef::MediaFile(file) => file.file_binary.as_deref(),
            AssetRef::MetaFile(file) => file.meta_file_binary.as_deref(),
            AssetRef::Attachment(attachment) => attachment.attachment_binary.as_deref(),
            AssetRef::AttachmentVersion(version) => version.attachment_binary.as_deref(),
        }
    }
}

/// Mutable borrow of exactly one asset record.
///
/// Each variant has its own byte-source and write-back rules, so callers
/// dispatch on the variant instead of going through a shared interface.
#[derive(Debug)]
pub enum AssetMut<'a> {
    MediaFile(&'a mut MediaFile),
    MetaFile(&'a mut MetaFile),
    Attachment(&'a mut Attachment),
    AttachmentVersion(&'a mut AttachmentVersion),
}

impl<'a> AssetMut<'a> {
    pub fn as_asset_ref(&self) -> AssetRef<'_> {
        match self {
            AssetMut::MediaFile(file) => AssetRef::MediaFile(&**file),
            AssetMut::MetaFile(file) => AssetRef::MetaFile(&**file),
            AssetMut::Attachment(attachment) => AssetRef::Attachment(&**attachment),
            AssetMut::AttachmentVersion(version) => AssetRef::AttachmentVersion(&**version),
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.as_asset_ref().kind()
    }

    pub fn extension(&self) -> &str {
        self.as_asset_ref().extension()
    }

    pub fn size(&self) -> i64 {
        self.as_asset_ref().size()
    }

    /// Bytes already held by the record, if any
    pub fn in_memory_binary(&self) -> Option<&[u8]> {
        self.as_asset_ref().binary()
    }

    /// Replace the record's payload and size with an optimized binary.
    ///
    /// Meta files fall back to a size of 0 when the length does not fit in
    /// `i32`; attachments reject such a binary and are left untouched.
    pub fn write_back(&mut self, binary: Vec<u8>) -> OptimizeResult<()> {
        let len = binary.len();
        match self {
            AssetMut::MediaFile(file) => {
                file.file_size = i64::try_from(len).map_err(|_| OptimizeError::SizeOverflow {
                    kind: AssetKind::MediaFile,
                    size: len,
                })?;
                file.file_binary = Some(binary);
            }
            AssetMut::MetaFile(file) => {
                file.meta_file_size = i32::try_from(len).unwrap_or(0);
                file.meta_file_binary = Some(binary);
            }
            AssetMut::Attachment(attachment) => {
                attachment.attachment_size =
                    i32::try_from(len).map_err(|_| OptimizeError::SizeOverflow {
                        kind: AssetKind::Attachment,
                        size: len,
                    })?;
                attachment.attachment_binary = Some(binary);
            }
            AssetMut::AttachmentVersion(version) => {
                version.attachment_size =
                    i32::try_from(len).map_err(|_| OptimizeError::SizeOverflow {
                        kind: AssetKind::AttachmentVersion,
                        size: len,
                    })?;
                version.attachment_binary = Some(binary);
            }
        }
        Ok(())
    }
}

impl<'a> From<&'a mut MediaFile> for AssetMut<'a> {
    fn from(file: &'a mut MediaFile) -> Self {
        AssetMut::MediaFile(file)
    }
}

impl<'a> From<&'a mut MetaFile> for AssetMut<'a> {
    fn from(file: &'a mut MetaFile) -> Self {
        AssetMut::MetaFile(file)
    }
}

impl<'a> From<&'a mut Attachment> for AssetMut<'a> {
    fn from(attachment: &'a mut Attachment) -> Self {
        AssetMut::Attachment(attachment)
    }
}

impl<'a> From<&'a mut AttachmentVersion> for AssetMut<'a> {
    fn from(version: &'a mut AttachmentVersion) -> Self {
        AssetMut::AttachmentVersion(version)
    }
}
