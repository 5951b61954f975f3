//! PNG and JPEG sample codecs
//!
//! Pixels are dense `u8` buffers in row-major `(height, width, channels)`
//! order. Inputs of shape `(h, w)` are treated as single-channel.

use std::io::Cursor;

use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::codecs::png::{PngDecoder, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat};

use crate::{Error, ImageKind, Result};

const JPEG_QUALITY: u8 = 90;

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Jpeg => ImageFormat::Jpeg,
    }
}

/// Split a sample shape into `(height, width, channels)`
fn hwc(kind: ImageKind, shape: &[usize]) -> Result<(usize, usize, usize)> {
    let unsupported = || Error::UnsupportedShape {
        codec: kind.name(),
        shape: shape.to_vec(),
    };
    let (h, w, c) = match *shape {
        [h, w] => (h, w, 1),
        [h, w, c] => (h, w, c),
        _ => return Err(unsupported()),
    };
    let channels_ok = match kind {
        ImageKind::Png => (1..=4).contains(&c),
        ImageKind::Jpeg => c == 1 || c == 3,
    };
    if !channels_ok || h == 0 || w == 0 || h > u32::MAX as usize || w > u32::MAX as usize {
        return Err(unsupported());
    }
    Ok((h, w, c))
}

fn color_type(channels: usize) -> ExtendedColorType {
    match channels {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        _ => ExtendedColorType::Rgba8,
    }
}

/// Encode pixels of the given shape
pub fn encode(kind: ImageKind, pixels: &[u8], shape: &[usize]) -> Result<Vec<u8>> {
    let (h, w, c) = hwc(kind, shape)?;
    if pixels.len() != h * w * c {
        return Err(Error::Compression(format!(
            "{} expects {} bytes for shape {:?}, got {}",
            kind.name(),
            h * w * c,
            shape,
            pixels.len()
        )));
    }

    let mut out = Vec::new();
    let written = match kind {
        ImageKind::Png => {
            PngEncoder::new(&mut out).write_image(pixels, w as u32, h as u32, color_type(c))
        }
        ImageKind::Jpeg => JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).write_image(
            pixels,
            w as u32,
            h as u32,
            color_type(c),
        ),
    };
    written.map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

/// Decode to an [`image::DynamicImage`]
pub fn decode_image(kind: ImageKind, bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(bytes, image_format(kind))
        .map_err(|e| Error::Decompression(e.to_string()))
}

/// Decode to dense `u8` pixels and their `(height, width, channels)` shape
pub fn decode(kind: ImageKind, bytes: &[u8]) -> Result<(Vec<u8>, Vec<usize>)> {
    let img = decode_image(kind, bytes)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let channels = img.color().channel_count() as usize;
    let data = match channels {
        1 => img.into_luma8().into_raw(),
        2 => img.into_luma_alpha8().into_raw(),
        3 => img.into_rgb8().into_raw(),
        _ => img.into_rgba8().into_raw(),
    };
    let channels = channels.min(4);
    Ok((data, vec![h, w, channels]))
}

/// Read `(height, width, channels)` from the header without decoding pixels
pub fn probe_shape(kind: ImageKind, bytes: &[u8]) -> Result<Vec<usize>> {
    let err = |e: image::ImageError| Error::Decompression(e.to_string());
    let ((w, h), color) = match kind {
        ImageKind::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes)).map_err(err)?;
            (decoder.dimensions(), decoder.color_type())
        }
        ImageKind::Jpeg => {
            let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(err)?;
            (decoder.dimensions(), decoder.color_type())
        }
    };
    Ok(vec![
        h as usize,
        w as usize,
        (color.channel_count() as usize).min(4),
    ])
}
