//! QR code decoding of slip images.

use enrollo_common::{AppError, AppResult};

/// QR decoding collaborator.
#[async_trait::async_trait]
pub trait QrDecoder: Send + Sync {
    /// Decode the first readable QR code in an image.
    ///
    /// Fails with [`AppError::NotFound`] when no code can be read.
    async fn decode(&self, image: &[u8]) -> AppResult<String>;
}

/// Decoder backed by `rqrr`.
#[derive(Debug, Clone, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    /// Create a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn decode_blocking(image: &[u8]) -> AppResult<String> {
        let luma = image::load_from_memory(image)
            .map_err(|e| AppError::BadRequest(format!("Unreadable image: {e}")))?
            .to_luma8();

        let (width, height) = (luma.width() as usize, luma.height() as usize);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::NotFound("No QR code found in image".to_string()))
    }
}

#[async_trait::async_trait]
impl QrDecoder for RqrrDecoder {
    async fn decode(&self, image: &[u8]) -> AppResult<String> {
        let bytes = image.to_vec();
        tokio::task::spawn_blocking(move || Self::decode_blocking(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("QR decode task failed: {e}")))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Luma};
    use std::io::Cursor;

    fn blank_png() -> Vec<u8> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(64, 64, Luma([255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_blank_image_has_no_code() {
        let result = RqrrDecoder::new().decode(&blank_png()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_garbage_is_bad_request() {
        let result = RqrrDecoder::new().decode(b"not an image").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
