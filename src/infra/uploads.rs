//! Filesystem storage for post images, served back under [`MEDIA_ROUTE_PREFIX`].

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use slug::slugify;
use tokio::fs;
use uuid::Uuid;

use crate::application::media::{MediaError, MediaStore};

pub const MEDIA_ROUTE_PREFIX: &str = "/media/";

const IMAGE_DIRECTORY: &str = "posts_images";
const MAX_STEM_CHARS: usize = 64;

#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write the payload under a fresh dated name and return that stored path.
    pub async fn store(&self, original_name: &str, data: Bytes) -> Result<String, MediaError> {
        if data.is_empty() {
            return Err(MediaError::EmptyPayload);
        }

        let stored_path = build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, &data).await?;

        Ok(stored_path)
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaError> {
        let absolute = self.resolve(stored_path)?;
        match fs::read(absolute).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(MediaError::NotFound),
            Err(err) => Err(MediaError::Io(err)),
        }
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(MediaError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for UploadStorage {
    async fn save(&self, file_name: &str, data: Bytes) -> Result<String, MediaError> {
        let stored_path = self.store(file_name, data).await?;
        Ok(format!("{MEDIA_ROUTE_PREFIX}{stored_path}"))
    }

    async fn discard(&self, public_path: &str) -> Result<(), MediaError> {
        let stored_path = public_path
            .strip_prefix(MEDIA_ROUTE_PREFIX)
            .ok_or(MediaError::InvalidPath)?;
        self.delete(stored_path).await
    }
}

fn build_stored_path(original_name: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    format!(
        "{IMAGE_DIRECTORY}/{year}/{:02}/{day:02}/{identifier}-{filename}",
        month as u8
    )
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base: String = slugify(stem).chars().take(MAX_STEM_CHARS).collect();
    let trimmed = base.trim_end_matches('-').len();
    base.truncate(trimmed);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
