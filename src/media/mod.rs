//! 图片获取：下载提及中的图片到本地临时文件，并统一为 RGB JPEG
//!
//! HttpImageAcquirer 为真实实现；MockAcquirer 用于测试。

pub mod mock;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;

use crate::core::BotError;
use crate::mention::MediaKind;

pub use mock::MockAcquirer;

#[async_trait]
pub trait ImageAcquirer: Send + Sync {
    /// 下载 url 指向的图片，返回本地路径（已归一化为 JPEG）
    async fn fetch_to_local(&self, url: &str) -> Result<PathBuf, BotError>;

    /// 释放 fetch_to_local 产生的临时文件
    async fn release(&self, path: &Path);
}

pub struct HttpImageAcquirer {
    client: Client,
    scratch_dir: PathBuf,
}

impl HttpImageAcquirer {
    /// 下载到 scratch_dir；timeout_secs 为单次下载超时
    pub fn new(scratch_dir: impl Into<PathBuf>, timeout_secs: u64) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BotError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            scratch_dir: scratch_dir.into(),
        })
    }
}

#[async_trait]
impl ImageAcquirer for HttpImageAcquirer {
    async fn fetch_to_local(&self, url: &str) -> Result<PathBuf, BotError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BotError::Acquisition(format!("download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(BotError::Acquisition(format!(
                "download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Acquisition(format!("download {}: {}", url, e)))?;

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| BotError::Acquisition(format!("scratch dir: {}", e)))?;
        let dest = self
            .scratch_dir
            .join(format!("{}.jpg", uuid::Uuid::new_v4()));

        let kind = MediaKind::from_url(url);
        let target = dest.clone();
        tokio::task::spawn_blocking(move || store_as_jpeg(&bytes, kind, &target))
            .await
            .map_err(|e| BotError::Acquisition(format!("normalize task: {}", e)))??;

        tracing::debug!(url = %url, path = %dest.display(), "image acquired");
        Ok(dest)
    }

    async fn release(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!("Failed to remove scratch file {}: {}", path.display(), e);
        }
    }
}

/// JPEG 原样写入；其它格式解码后转 RGB8 再编码为 JPEG
pub fn store_as_jpeg(bytes: &[u8], kind: MediaKind, dest: &Path) -> Result<(), BotError> {
    if kind == MediaKind::Jpeg {
        return std::fs::write(dest, bytes)
            .map_err(|e| BotError::Acquisition(format!("write {}: {}", dest.display(), e)));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| BotError::Acquisition(format!("decode image: {}", e)))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut encoded = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
        .map_err(|e| BotError::Acquisition(format!("encode jpeg: {}", e)))?;
    std::fs::write(dest, encoded)
        .map_err(|e| BotError::Acquisition(format!("write {}: {}", dest.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(8, 6, Rgba([200, 30, 30, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_is_normalized_to_rgb_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("in.jpg");
        store_as_jpeg(&png_bytes(), MediaKind::Png, &dest).unwrap();

        let written = std::fs::read(&dest).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_jpeg_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("in.jpg");
        let bytes = b"\xFF\xD8\xFFnot-really-decoded".to_vec();
        store_as_jpeg(&bytes, MediaKind::Jpeg, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), bytes);
    }

    #[test]
    fn test_undecodable_png_is_acquisition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_as_jpeg(b"garbage", MediaKind::Png, &dir.path().join("x.jpg")).unwrap_err();
        assert!(matches!(err, BotError::Acquisition(_)));
    }
}
