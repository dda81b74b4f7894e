//! Image acquisition
//!
//! Downloads the images a row references, stores them under the public
//! upload root and derives a square JPEG thumbnail for each one.
//!
//! Layout below the upload root:
//! - `inventories/images/{id}.{ext}` for the original
//! - `inventories/images/thumbnails/{id}-thumbnail.jpg` for the thumbnail

use crate::config::UploadConfig;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Directory for inventory images, relative to the upload root
pub const IMAGES_DIR: &str = "inventories/images";

/// Thumbnail directory, relative to [`IMAGES_DIR`]
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Error acquiring a single image
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote server answered {0}")]
    Status(u16),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("unsupported image type {0}")]
    UnsupportedType(String),

    #[error("invalid image data: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Source of remote image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquireError>;
}

/// [`ImageFetcher`] over HTTP(S)
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_size: u64,
}

impl HttpImageFetcher {
    /// `timeout` bounds each whole download, body included.
    pub fn new(timeout: Duration, max_size: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mycad/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, max_size })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquireError> {
        let mut response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AcquireError::Status(response.status().as_u16()));
        }
        if response.content_length().is_some_and(|len| len > self.max_size) {
            return Err(AcquireError::TooLarge {
                limit: self.max_size,
            });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_size {
                return Err(AcquireError::TooLarge {
                    limit: self.max_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

/// An image written to the upload root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Public path of the original, e.g. `uploads/inventories/images/{id}.png`
    pub url: String,
    /// Public path of the thumbnail
    pub thumbnail: String,
    pub mime_type: String,
    pub path: PathBuf,
    pub thumbnail_path: PathBuf,
}

/// Writes originals and thumbnails below the upload root
#[derive(Debug, Clone)]
pub struct ImageStore {
    upload: UploadConfig,
    public_prefix: String,
    thumbnail_size: u32,
}

impl ImageStore {
    pub fn new(upload: &UploadConfig, thumbnail_size: u32) -> Self {
        Self {
            upload: upload.clone(),
            public_prefix: upload.public_prefix.trim_end_matches('/').to_string(),
            thumbnail_size,
        }
    }

    /// Decode `data`, then persist it and its thumbnail.
    ///
    /// Nothing is left on disk when any step fails.
    pub async fn store(&self, data: Bytes) -> Result<StoredImage, AcquireError> {
        if data.len() as u64 > self.upload.max_file_size {
            return Err(AcquireError::TooLarge {
                limit: self.upload.max_file_size,
            });
        }
        let format = image::guess_format(&data)?;
        let mime_type = format.to_mime_type();
        if !self.upload.is_type_allowed(mime_type) {
            return Err(AcquireError::UnsupportedType(mime_type.to_string()));
        }
        let extension = format.extensions_str().first().copied().unwrap_or("img");

        let id = Uuid::new_v4();
        let file_name = format!("{}.{}", id, extension);
        let thumbnail_name = format!("{}-thumbnail.jpg", id);

        let images_dir = self.upload.path.join(IMAGES_DIR);
        let thumbnails_dir = images_dir.join(THUMBNAILS_DIR);
        tokio::fs::create_dir_all(&thumbnails_dir).await?;

        let path = images_dir.join(&file_name);
        let thumbnail_path = thumbnails_dir.join(&thumbnail_name);
        let size = self.thumbnail_size;

        let (original, thumbnail) = (path.clone(), thumbnail_path.clone());
        tokio::task::spawn_blocking(move || {
            write_with_thumbnail(&data, format, &original, &thumbnail, size)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Thumbnail task failed: {}", e))??;

        Ok(StoredImage {
            url: format!("{}/{}/{}", self.public_prefix, IMAGES_DIR, file_name),
            thumbnail: format!(
                "{}/{}/{}/{}",
                self.public_prefix, IMAGES_DIR, THUMBNAILS_DIR, thumbnail_name
            ),
            mime_type: mime_type.to_string(),
            path,
            thumbnail_path,
        })
    }

    /// Delete a stored image and its thumbnail. Failures are only logged.
    pub async fn remove(&self, image: &StoredImage) {
        for path in [&image.path, &image.thumbnail_path] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn write_with_thumbnail(
    data: &[u8],
    format: ImageFormat,
    original: &Path,
    thumbnail: &Path,
    size: u32,
) -> Result<(), AcquireError> {
    let decoded = image::load_from_memory_with_format(data, format)?;
    let thumb = DynamicImage::ImageRgb8(
        decoded
            .resize_to_fill(size, size, FilterType::Lanczos3)
            .to_rgb8(),
    );

    persist_atomically(original, |file| Ok(file.write_all(data)?))?;

    let written = persist_atomically(thumbnail, |file| {
        thumb.write_to(file, ImageFormat::Jpeg)?;
        Ok(())
    });
    if written.is_err() {
        if let Err(e) = std::fs::remove_file(original) {
            tracing::warn!("Failed to remove {}: {}", original.display(), e);
        }
    }
    written
}

/// Write through a temporary file in the target directory and move it into
/// place once complete.
fn persist_atomically(
    target: &Path,
    write: impl FnOnce(&mut NamedTempFile) -> Result<(), AcquireError>,
) -> Result<(), AcquireError> {
    let dir = target
        .parent()
        .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", target.display()))?;
    let mut temp = NamedTempFile::new_in(dir)?;
    write(&mut temp)?;
    temp.persist(target).map_err(|e| AcquireError::Io(e.error))?;
    Ok(())
}

/// Fetch and store images, one URL at a time
pub struct ImageAcquirer {
    fetcher: Arc<dyn ImageFetcher>,
    store: ImageStore,
}

impl ImageAcquirer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, store: ImageStore) -> Self {
        Self { fetcher, store }
    }

    pub async fn acquire(&self, url: &str) -> Result<StoredImage, AcquireError> {
        let data = self.fetcher.fetch(url).await?;
        self.store.store(data).await
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A 300x200 PNG
    pub(crate) fn sample_png() -> Bytes {
        let img = ImageBuffer::from_pixel(300, 200, Rgba([200u8, 30, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    /// Serves fixed bodies by URL; unknown URLs fail with 404.
    pub(crate) struct StaticFetcher {
        pub bodies: HashMap<String, Bytes>,
    }

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, AcquireError> {
            self.bodies
                .get(url)
                .cloned()
                .ok_or(AcquireError::Status(404))
        }
    }

    /// HTTP fetcher that talks to local test servers directly, whatever the
    /// proxy settings of the environment.
    pub(crate) fn local_fetcher(timeout: Duration, max_size: u64) -> HttpImageFetcher {
        HttpImageFetcher {
            client: reqwest::Client::builder()
                .no_proxy()
                .timeout(timeout)
                .build()
                .unwrap(),
            max_size,
        }
    }

    /// Accepts connections and never answers. Returns an image URL on it.
    pub(crate) async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });
        format!("http://{}/foto.png", addr)
    }

    /// Answers a single request with `response` verbatim.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 2048];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}/foto.png", addr)
    }

    pub(crate) fn test_store(root: &Path) -> ImageStore {
        ImageStore::new(
            &UploadConfig {
                path: root.to_path_buf(),
                ..Default::default()
            },
            150,
        )
    }

    fn count_files(dir: &Path) -> usize {
        walk(dir).len()
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    files.extend(walk(&path));
                } else {
                    files.push(path);
                }
            }
        }
        files
    }

    #[tokio::test]
    async fn test_store_writes_original_and_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let stored = store.store(sample_png()).await.unwrap();

        assert_eq!(stored.mime_type, "image/png");
        assert!(stored.url.starts_with("uploads/inventories/images/"));
        assert!(stored.url.ends_with(".png"));
        assert!(stored
            .thumbnail
            .starts_with("uploads/inventories/images/thumbnails/"));
        assert!(stored.thumbnail.ends_with("-thumbnail.jpg"));
        assert!(stored.path.starts_with(dir.path()));

        let thumb = image::open(&stored.thumbnail_path).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (150, 150));
        let original = image::open(&stored.path).unwrap();
        assert_eq!((original.width(), original.height()), (300, 200));
    }

    #[tokio::test]
    async fn test_store_rejects_non_image_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let result = store.store(Bytes::from_static(b"<html>not found</html>")).await;

        assert!(matches!(result, Err(AcquireError::Decode(_))));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_store_rejects_truncated_image_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let png = sample_png();

        let result = store.store(png.slice(..png.len() / 2)).await;

        assert!(result.is_err());
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_store_rejects_disallowed_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(
            &UploadConfig {
                path: dir.path().to_path_buf(),
                allowed_types: vec!["image/jpeg".to_string()],
                ..Default::default()
            },
            150,
        );

        let result = store.store(sample_png()).await;

        assert!(matches!(result, Err(AcquireError::UnsupportedType(t)) if t == "image/png"));
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(
            &UploadConfig {
                path: dir.path().to_path_buf(),
                max_file_size: 16,
                ..Default::default()
            },
            150,
        );

        let result = store.store(sample_png()).await;

        assert!(matches!(result, Err(AcquireError::TooLarge { limit: 16 })));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_remove_deletes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let stored = store.store(sample_png()).await.unwrap();

        store.remove(&stored).await;

        assert!(!stored.path.exists());
        assert!(!stored.thumbnail_path.exists());
    }

    #[tokio::test]
    async fn test_acquirer_reports_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = ImageAcquirer::new(
            Arc::new(StaticFetcher {
                bodies: HashMap::new(),
            }),
            test_store(dir.path()),
        );

        let result = acquirer.acquire("http://missing/a.png").await;

        assert!(matches!(result, Err(AcquireError::Status(404))));
    }

    #[test]
    fn test_failed_thumbnail_removes_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("original.png");
        let thumbnail = dir.path().join("missing").join("thumb.jpg");

        let result =
            write_with_thumbnail(&sample_png(), ImageFormat::Png, &original, &thumbnail, 150);

        assert!(result.is_err());
        assert!(!original.exists());
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_http_fetcher_times_out_on_silent_server() {
        let url = silent_server().await;
        let fetcher = local_fetcher(Duration::from_millis(500), 1024 * 1024);

        let started = Instant::now();
        let result = fetcher.fetch(&url).await;

        assert!(matches!(&result, Err(AcquireError::Request(e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_body() {
        let png = sample_png();
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            png.len()
        )
        .into_bytes();
        response.extend_from_slice(&png);
        let url = serve_once(response).await;

        let body = local_fetcher(Duration::from_secs(5), 1024 * 1024)
            .fetch(&url)
            .await
            .unwrap();

        assert_eq!(body, png);
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_declared_oversized_body() {
        let mut response =
            b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(&[0u8; 4096]);
        let url = serve_once(response).await;

        let result = local_fetcher(Duration::from_secs(5), 1024).fetch(&url).await;

        assert!(matches!(result, Err(AcquireError::TooLarge { limit: 1024 })));
    }

    #[tokio::test]
    async fn test_http_fetcher_caps_streamed_body() {
        let mut response =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        for _ in 0..4 {
            response.extend_from_slice(b"200\r\n");
            response.extend_from_slice(&[7u8; 0x200]);
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");
        let url = serve_once(response).await;

        let result = local_fetcher(Duration::from_secs(5), 1024).fetch(&url).await;

        assert!(matches!(result, Err(AcquireError::TooLarge { limit: 1024 })));
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_error_status() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;

        let result = local_fetcher(Duration::from_secs(5), 1024).fetch(&url).await;

        assert!(matches!(result, Err(AcquireError::Status(404))));
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_invalid_url() {
        let fetcher = HttpImageFetcher::new(Duration::from_secs(1), 1024).unwrap();

        let result = fetcher.fetch("not a url").await;

        assert!(matches!(result, Err(AcquireError::Request(_))));
    }
}
