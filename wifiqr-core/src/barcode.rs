//! Barcode Encoder - QR image bytes for a wire string
//!
//! Knows nothing about credentials; it encodes whatever string it is given.

use base64::Engine;
use image::Luma;
use qrcode::QrCode;
use std::io::Cursor;
use thiserror::Error;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static ENCODE_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_encode_call_count() -> u32 {
    ENCODE_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_encode_call_count() {
    ENCODE_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("QR encoding failed: {0}")]
    Capacity(String),

    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Encode `data` as a QR code and return PNG bytes.
pub fn encode_png(data: &str) -> Result<Vec<u8>, EncodingError> {
    #[cfg(feature = "test-hooks")]
    ENCODE_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

    let code = QrCode::new(data.as_bytes()).map_err(|e| EncodingError::Capacity(e.to_string()))?;
    let image = code.render::<Luma<u8>>().build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

    Ok(png)
}

/// Standard base64 of the PNG bytes, for embedding in template source.
pub fn encode_base64(data: &str) -> Result<String, EncodingError> {
    let png = encode_png(data)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}
