use crate::prelude::Frame;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;

/// JPEG quality used for alert evidence.
pub const STILL_QUALITY: u8 = 80;

/// Encodes an RGB frame as a `data:image/jpeg;base64,...` URL.
pub fn encode_still(frame: &Frame, quality: u8) -> Option<String> {
    let (height, width, channels) = frame.pixels.dim();
    if channels != 3 || width == 0 || height == 0 {
        return None;
    }

    let raw: Vec<u8> = frame.pixels.iter().copied().collect();
    let img: RgbImage = ImageBuffer::from_raw(width as u32, height as u32, raw)?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder).ok()?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
    Some(format!("data:image/jpeg;base64,{}", encoded))
}
