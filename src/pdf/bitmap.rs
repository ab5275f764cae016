//! Image XObject serialization: JPEG for opaque images when the encoding quality
//! allows it, flate-compressed raw channels otherwise, with a soft-mask stream for
//! the alpha channel.

use std::sync::Arc;

#[cfg(feature = "image")]
use log::debug;

use crate::core::{ColorType, Image, Pixmap};
use crate::geom::ISize;
use crate::pdf::document::{DocumentCore, PdfStreamCompression};
use crate::pdf::object::{ObjectRef, PdfDictionary, PdfValue};

enum StreamFormat {
    Dct,
    Flate,
    Uncompressed,
}

fn emit_image_stream(
    core: &mut DocumentCore, reference: ObjectRef, data: Vec<u8>, size: ISize,
    color_space: PdfValue, smask: Option<ObjectRef>, format: StreamFormat,
) -> ObjectRef {
    let mut dictionary = PdfDictionary::of_type("XObject");
    dictionary.insert_name("Subtype", "Image");
    dictionary.insert_int("Width", size.width);
    dictionary.insert_int("Height", size.height);
    dictionary.insert("ColorSpace", color_space);
    if let Some(smask) = smask {
        dictionary.insert_ref("SMask", smask);
    }
    dictionary.insert_int("BitsPerComponent", 8);
    match format {
        StreamFormat::Dct => {
            dictionary.insert_name("Filter", "DCTDecode");
            dictionary.insert_int("ColorTransform", 0);
        }
        StreamFormat::Flate => dictionary.insert_name("Filter", "FlateDecode"),
        StreamFormat::Uncompressed => {}
    }
    // The payload is already in its final encoding.
    core.writer.emit_stream_data_with_ref(dictionary, data, PdfStreamCompression::No, reference)
}

/// Average of the non-transparent neighbors, used to fill fully transparent pixels so
/// JPEG/flate ringing does not halo against the matte.
fn neighbor_average_color(pixmap: &Pixmap, x_orig: i32, y_orig: i32) -> (u8, u8, u8) {
    let mut r = 0u32;
    let mut g = 0u32;
    let mut b = 0u32;
    let mut n = 0u32;
    let y_min = (y_orig - 1).max(0);
    let y_max = (y_orig + 1).min(pixmap.height() - 1);
    let x_min = (x_orig - 1).max(0);
    let x_max = (x_orig + 1).min(pixmap.width() - 1);
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let color = pixmap.pixel32(x, y);
            if color != 0 {
                r += color & 0xFF;
                g += (color >> 8) & 0xFF;
                b += (color >> 16) & 0xFF;
                n += 1;
            }
        }
    }
    if n > 0 {
        ((r / n) as u8, (g / n) as u8, (b / n) as u8)
    } else {
        (0, 0, 0)
    }
}

fn compress_if_enabled(core: &DocumentCore, raw: Vec<u8>) -> (Vec<u8>, StreamFormat) {
    use crate::pdf::metadata::CompressionLevel;
    let level = core.writer.compression_level();
    if level == CompressionLevel::None {
        (raw, StreamFormat::Uncompressed)
    } else {
        (crate::pdf::deflate::deflate_bytes(&raw, level.zlib_level()), StreamFormat::Flate)
    }
}

/// The alpha channel as a DeviceGray stream for use as an SMask.
fn serialize_alpha(core: &mut DocumentCore, pixmap: &Pixmap, reference: ObjectRef) -> ObjectRef {
    let mut raw = Vec::with_capacity((pixmap.width() * pixmap.height()) as usize);
    match pixmap.color_type() {
        ColorType::Alpha8 | ColorType::Gray8 => {
            for y in 0..pixmap.height() {
                raw.extend_from_slice(&pixmap.row(y)[..pixmap.width() as usize]);
            }
        }
        ColorType::Rgba8888 => {
            for y in 0..pixmap.height() {
                let row = pixmap.row(y);
                for x in 0..pixmap.width() as usize {
                    raw.push(row[x * 4 + 3]);
                }
            }
        }
    }
    let (data, format) = compress_if_enabled(core, raw);
    emit_image_stream(
        core,
        reference,
        data,
        ISize::new(pixmap.width(), pixmap.height()),
        PdfValue::Name("DeviceGray"),
        None,
        format,
    )
}

fn serialize_deflated_image(
    core: &mut DocumentCore, pixmap: &Pixmap, is_opaque: bool, reference: ObjectRef,
) -> ObjectRef {
    let smask_ref = if is_opaque { None } else { Some(core.writer.reserve_ref()) };
    let size = ISize::new(pixmap.width(), pixmap.height());
    let (raw, color_space) = match pixmap.color_type() {
        ColorType::Alpha8 => {
            // The color channel of a pure mask is flat black.
            (
                vec![0u8; (pixmap.width() * pixmap.height()) as usize],
                PdfValue::Name("DeviceGray"),
            )
        }
        ColorType::Gray8 => {
            let mut raw = Vec::with_capacity((pixmap.width() * pixmap.height()) as usize);
            for y in 0..pixmap.height() {
                raw.extend_from_slice(&pixmap.row(y)[..pixmap.width() as usize]);
            }
            (raw, PdfValue::Name("DeviceGray"))
        }
        ColorType::Rgba8888 => {
            let mut raw =
                Vec::with_capacity((pixmap.width() * pixmap.height() * 3) as usize);
            for y in 0..pixmap.height() {
                let row = pixmap.row(y);
                for x in 0..pixmap.width() as usize {
                    let alpha = row[x * 4 + 3];
                    if alpha == 0 {
                        let (r, g, b) = neighbor_average_color(pixmap, x as i32, y);
                        raw.extend_from_slice(&[r, g, b]);
                    } else {
                        raw.extend_from_slice(&row[x * 4..x * 4 + 3]);
                    }
                }
            }
            let color_space_ref = core.color_space_ref();
            (raw, PdfValue::Ref(color_space_ref))
        }
    };
    let (data, format) = compress_if_enabled(core, raw);
    let image_ref = emit_image_stream(core, reference, data, size, color_space, smask_ref, format);
    if let Some(smask_ref) = smask_ref {
        serialize_alpha(core, pixmap, smask_ref);
    }
    image_ref
}

#[cfg(feature = "image")]
fn encode_jpeg(pixmap: &Pixmap, quality: i32) -> Option<Vec<u8>> {
    let mut rgb = Vec::with_capacity((pixmap.width() * pixmap.height() * 3) as usize);
    match pixmap.color_type() {
        ColorType::Rgba8888 => {
            for y in 0..pixmap.height() {
                let row = pixmap.row(y);
                for x in 0..pixmap.width() as usize {
                    rgb.extend_from_slice(&row[x * 4..x * 4 + 3]);
                }
            }
        }
        ColorType::Gray8 => {
            for y in 0..pixmap.height() {
                for &value in &pixmap.row(y)[..pixmap.width() as usize] {
                    rgb.extend_from_slice(&[value, value, value]);
                }
            }
        }
        ColorType::Alpha8 => return None,
    }
    let mut encoded = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        &mut encoded,
        quality.clamp(1, 100) as u8,
    );
    image::ImageEncoder::write_image(
        encoder,
        &rgb,
        pixmap.width() as u32,
        pixmap.height() as u32,
        image::ExtendedColorType::Rgb8,
    )
    .ok()?;
    Some(encoded)
}

/// Serializes an image as an Image XObject, returning its reference. Opaque images
/// with an encoding quality of 100 or less are JPEG-compressed; everything else is
/// flate, with an SMask carrying any alpha.
pub fn serialize_image(
    core: &mut DocumentCore, image: &Arc<dyn Image>, encoding_quality: i32,
) -> Option<ObjectRef> {
    let pixmap = image.make_pixmap()?;
    let is_opaque = pixmap.is_opaque();
    let reference = core.writer.reserve_ref();
    #[cfg(feature = "image")]
    if is_opaque && encoding_quality <= 100 {
        if let Some(jpeg) = encode_jpeg(&pixmap, encoding_quality) {
            let color_space = match pixmap.color_type() {
                ColorType::Gray8 => PdfValue::Name("DeviceGray"),
                _ => PdfValue::Name("DeviceRGB"),
            };
            let size = ISize::new(pixmap.width(), pixmap.height());
            return Some(emit_image_stream(
                core,
                reference,
                jpeg,
                size,
                color_space,
                None,
                StreamFormat::Dct,
            ));
        }
        debug!("JPEG encoding failed; falling back to flate");
    }
    #[cfg(not(feature = "image"))]
    let _ = encoding_quality;
    Some(serialize_deflated_image(core, &pixmap, is_opaque, reference))
}
