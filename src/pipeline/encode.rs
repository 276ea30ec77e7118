//! Image encoding: `DynamicImage` → PNG bytes → base64 `ImageData`.
//!
//! PNG is used everywhere: figures are written to `temp_figures/` as PNG,
//! and the vision and review models receive lossless page renders.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn to_png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap PNG bytes as a base64 image attachment for a multimodal request.
///
/// `detail: "high"` keeps fine print legible for GPT-4-class models; other
/// providers ignore it.
pub fn png_image_data(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

/// Encode a rasterised page as a base64 PNG ready for the review model.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    Ok(png_image_data(&to_png_bytes(img)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn png_bytes_round_trip_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(7, 3, Rgba([0, 0, 0, 255])));
        let png = to_png_bytes(&img).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (7, 3));
    }
}
