pub mod asset;
pub mod document;

pub use asset::{
    AssetKind, AssetMut, AssetRef, Attachment, AttachmentVersion, MediaFile, MetaFile,
};
pub use document::{Document, WorkflowStep};
