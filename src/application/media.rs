//! Storage seam for images attached to posts.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media path")]
    InvalidPath,
    #[error("media file not found")]
    NotFound,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stores post images and hands back the public path each one is served from.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save(&self, file_name: &str, data: Bytes) -> Result<String, MediaError>;

    /// Remove a file previously returned by [`MediaStore::save`]. Missing files are fine.
    async fn discard(&self, public_path: &str) -> Result<(), MediaError>;
}
