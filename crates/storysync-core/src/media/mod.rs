//! Photo preprocessing before upload.
//!
//! Oversized payloads are decoded, shrunk to fit a bounding box while keeping
//! their aspect ratio, and re-encoded in the same image family.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::{Error, Result};
use crate::models::{is_image_mime, Photo};
use crate::remote::UploadPhoto;

/// Payloads above this size are resized before submission (1 MiB).
pub const UPLOAD_SIZE_THRESHOLD: usize = 1024 * 1024;

/// Bounds and quality used when shrinking a photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOptions {
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`; lossless formats ignore it.
    pub quality: f32,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            quality: 0.7,
        }
    }
}

/// Re-encoded photo payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPhoto {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Outcome of preparing a pending photo for a create request.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoPreparation {
    /// No pending payload to upload.
    Skip,
    /// Attach this payload; `resized` tells whether the preprocessor ran.
    Attach { photo: UploadPhoto, resized: bool },
    /// The photo is left out of this submission; the rest still syncs.
    Dropped { reason: String },
}

/// Compute output dimensions: clamp width first, then height, never upscale.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = f64::from(width);
    let mut h = f64::from(height);
    let max_w = f64::from(max_width);
    let max_h = f64::from(max_height);

    if w > max_w {
        h = max_w / w * h;
        w = max_w;
    }
    if h > max_h {
        w = max_h / h * w;
        h = max_h;
    }

    (to_pixels(w), to_pixels(h))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(value: f64) -> u32 {
    (value.floor() as u32).max(1)
}

/// Decode, shrink and re-encode an image payload.
///
/// The output keeps the input's image family. If re-encoding would not make
/// the payload smaller, the input bytes are returned as-is.
pub fn resize_photo(
    bytes: &[u8],
    mime_type: &str,
    options: ResizeOptions,
) -> Result<ProcessedPhoto> {
    if bytes.is_empty() {
        return Err(Error::MediaProcessing("Photo payload is empty".to_string()));
    }
    if options.max_width == 0 || options.max_height == 0 {
        return Err(Error::MediaProcessing(
            "Resize bounds must be greater than zero".to_string(),
        ));
    }

    let mime_type = canonical_mime(mime_type);
    let format = format_for_mime(&mime_type)?;
    let source = image::load_from_memory(bytes)
        .map_err(|error| Error::MediaProcessing(format!("Failed to decode photo: {error}")))?;

    let (source_width, source_height) = source.dimensions();
    let (width, height) =
        target_dimensions(source_width, source_height, options.max_width, options.max_height);
    let resized = if (width, height) == (source_width, source_height) {
        source
    } else {
        source.resize_exact(width, height, FilterType::Triangle)
    };

    let encoded = encode(&resized, format, options.quality)?;
    tracing::debug!(
        "Resized photo {}x{} -> {}x{} ({} -> {} bytes)",
        source_width,
        source_height,
        width,
        height,
        bytes.len(),
        encoded.len()
    );

    if encoded.len() >= bytes.len() {
        return Ok(ProcessedPhoto {
            mime_type,
            bytes: bytes.to_vec(),
            width: source_width,
            height: source_height,
        });
    }

    Ok(ProcessedPhoto {
        mime_type,
        bytes: encoded,
        width,
        height,
    })
}

/// Turn a stored photo into an upload part.
///
/// Payloads above `threshold` go through [`resize_photo`]; when that fails or
/// yields something that is not an image of the same family, the photo is
/// dropped from this submission.
pub fn prepare_upload_photo(
    photo: Option<&Photo>,
    threshold: usize,
    options: ResizeOptions,
) -> PhotoPreparation {
    let Some(Photo::Pending { mime_type, bytes }) = photo else {
        return PhotoPreparation::Skip;
    };

    if bytes.len() <= threshold {
        if !is_image_mime(mime_type) {
            return PhotoPreparation::Dropped {
                reason: format!("payload is not an image ({mime_type})"),
            };
        }
        return PhotoPreparation::Attach {
            photo: UploadPhoto {
                mime_type: mime_type.clone(),
                bytes: bytes.clone(),
            },
            resized: false,
        };
    }

    match resize_photo(bytes, mime_type, options) {
        Ok(processed)
            if is_image_mime(&processed.mime_type)
                && same_family(&processed.mime_type, mime_type) =>
        {
            PhotoPreparation::Attach {
                photo: UploadPhoto {
                    mime_type: processed.mime_type,
                    bytes: processed.bytes,
                },
                resized: true,
            }
        }
        Ok(processed) => PhotoPreparation::Dropped {
            reason: format!(
                "preprocessor changed {mime_type} into {}",
                processed.mime_type
            ),
        },
        Err(error) => PhotoPreparation::Dropped {
            reason: error.to_string(),
        },
    }
}

fn canonical_mime(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

fn same_family(a: &str, b: &str) -> bool {
    canonical_mime(a) == canonical_mime(b)
}

fn format_for_mime(mime_type: &str) -> Result<ImageFormat> {
    if !is_image_mime(mime_type) {
        return Err(Error::MediaProcessing(format!(
            "Not an image payload: {mime_type}"
        )));
    }
    ImageFormat::from_mime_type(mime_type)
        .filter(|format| format.writing_enabled())
        .ok_or_else(|| Error::MediaProcessing(format!("Unsupported image type: {mime_type}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode(image: &DynamicImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
            // JPEG has no alpha channel
            encoder
                .encode_image(&image.to_rgb8())
                .map_err(|error| {
                    Error::MediaProcessing(format!("Failed to encode JPEG photo: {error}"))
                })?;
        }
        other => {
            image.write_to(&mut cursor, other).map_err(|error| {
                Error::MediaProcessing(format!("Failed to encode photo: {error}"))
            })?;
        }
    }

    Ok(cursor.into_inner())
}
