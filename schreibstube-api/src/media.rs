//! Storage for images attached to posts.

use axum::body::Bytes;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

const POST_IMAGE_DIR: &str = "posts";
const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Gif,
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media file operation failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The upload is not a supported image")]
pub struct InvalidImageError;

/// Upload in one of the accepted image formats that decodes completely.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidImage {
    bytes: Bytes,
    format: ImageFormat,
}

impl ValidImage {
    pub fn inspect(bytes: Bytes) -> Result<Self, InvalidImageError> {
        let format = image::guess_format(&bytes).map_err(|_| InvalidImageError)?;
        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(InvalidImageError);
        }
        image::load_from_memory_with_format(&bytes, format).map_err(|error| {
            debug!(?format, %error, "Upload failed to decode");
            InvalidImageError
        })?;

        Ok(Self { bytes, format })
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image under a fresh random name and returns its path relative to the root.
    pub async fn store_post_image(&self, image: &ValidImage) -> Result<String, MediaError> {
        let name = format!("{:016x}.{}", rand::random::<u64>(), image.extension());
        let relative = format!("{POST_IMAGE_DIR}/{name}");

        let directory = self.root.join(POST_IMAGE_DIR);
        fs::create_dir_all(&directory).await?;
        fs::write(directory.join(&name), &image.bytes).await?;

        debug!(path = %relative, size = image.bytes.len(), "Stored post image");
        Ok(relative)
    }

    /// Deletes a file previously returned by [`Self::store_post_image`].
    pub async fn remove(&self, relative: &str) -> Result<(), MediaError> {
        fs::remove_file(self.root.join(relative)).await?;

        debug!(path = %relative, "Removed post image");
        Ok(())
    }
}
