//! Frame encoding for the live channel
//!
//! Frames travel as JPEG data URLs (`data:image/jpeg;base64,...`), the
//! same shape the analysis service sends annotated frames back in.

use super::surface::RawFrame;
use crate::utils::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode an RGB8 frame as JPEG
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> AppResult<Vec<u8>> {
    if !frame.has_dimensions() {
        return Err(AppError::Unknown("Frame has no dimensions".to_string()));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(AppError::Unknown(format!(
            "Frame buffer is {} bytes, expected {} for {}x{}",
            frame.data.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let mut buf = Vec::with_capacity(frame.data.len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| AppError::Unknown(format!("JPEG encoding failed: {}", e)))?;

    Ok(buf)
}

/// Encode an RGB8 frame as a JPEG data URL
pub fn encode_frame_data_url(frame: &RawFrame, quality: u8) -> AppResult<String> {
    let jpeg = encode_jpeg(frame, quality)?;
    Ok(format!("{}{}", JPEG_DATA_URL_PREFIX, BASE64.encode(jpeg)))
}

/// Decode a base64 image, with or without a `data:` URL prefix
pub fn decode_image_payload(payload: &str) -> AppResult<Vec<u8>> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };

    BASE64
        .decode(encoded.trim())
        .map_err(|e| AppError::Unknown(format!("Invalid base64 image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RawFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        RawFrame::new(width, height, data)
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let jpeg = encode_jpeg(&gradient(32, 24), 80).unwrap();
        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_data_url_decodes_back_to_jpeg() {
        let url = encode_frame_data_url(&gradient(16, 16), 80).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let bytes = decode_image_payload(&url).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_rejects_short_buffer() {
        let frame = RawFrame::new(4, 4, vec![0; 10]);
        assert!(encode_jpeg(&frame, 80).is_err());
    }

    #[test]
    fn test_decode_plain_base64() {
        assert_eq!(decode_image_payload("AQID").unwrap(), vec![1, 2, 3]);
    }
}
