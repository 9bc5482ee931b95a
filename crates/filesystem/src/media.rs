//! Binary media classification.
//!
//! Turns image and document bytes into searchable metadata: pixel
//! dimensions, a bounded thumbnail, and a textual description, so binary
//! content can be surfaced to an agent without shipping full payloads.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;

use crate::error::{FilesystemError, Result};
use crate::types::{EntryKind, ImageMetadata};

/// Long-edge cap for generated thumbnails, in pixels.
pub const THUMBNAIL_MAX_EDGE: u32 = 128;

/// JPEG quality used for thumbnails of lossy source formats.
const THUMBNAIL_JPEG_QUALITY: u8 = 75;

/// Result of classifying image bytes.
#[derive(Debug, Clone)]
pub struct ClassifiedImage {
    pub metadata: ImageMetadata,
    pub thumbnail: Option<Vec<u8>>,
}

/// Decodes image bytes and extracts metadata plus a bounded thumbnail.
///
/// Thumbnail generation failure is non-fatal: metadata is still returned
/// and the failure is logged. A decode failure is returned as
/// `Classification` so the caller can store the entry with base fields only.
pub fn classify_image(bytes: &[u8], mime_type: &str) -> Result<ClassifiedImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|error| FilesystemError::Classification(format!("image decode: {error}")))?;

    let width = decoded.width();
    let height = decoded.height();
    let has_alpha = decoded.color().has_alpha();
    let format = format_label(mime_type);

    let mut description = format!("{width}x{height} pixels, {format}");
    if has_alpha {
        description.push_str(", with transparency");
    }

    let thumbnail = match encode_thumbnail(&decoded, mime_type) {
        Ok(encoded) => Some(encoded),
        Err(error) => {
            log::warn!("thumbnail generation failed ({mime_type}): {error}");
            None
        }
    };

    Ok(ClassifiedImage {
        metadata: ImageMetadata {
            width,
            height,
            format,
            has_alpha,
            description,
        },
        thumbnail,
    })
}

/// Documents are passed through untouched for rich-viewer consumption;
/// no content extraction happens at index time.
pub fn classify_document(bytes: Vec<u8>, _mime_type: &str) -> Vec<u8> {
    bytes
}

fn encode_thumbnail(decoded: &image::DynamicImage, mime_type: &str) -> Result<Vec<u8>> {
    // `thumbnail` preserves aspect ratio within the given bounds but scales
    // small images up to fit them; keep those at their original size.
    let thumb = if decoded.width().max(decoded.height()) > THUMBNAIL_MAX_EDGE {
        decoded.thumbnail(THUMBNAIL_MAX_EDGE, THUMBNAIL_MAX_EDGE)
    } else {
        decoded.clone()
    };

    let mut buffer = Vec::new();
    if is_lossy_mime(mime_type) {
        let rgb = thumb.to_rgb8();
        JpegEncoder::new_with_quality(&mut Cursor::new(&mut buffer), THUMBNAIL_JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|error| {
                FilesystemError::Classification(format!("thumbnail encode: {error}"))
            })?;
    } else {
        thumb
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|error| {
                FilesystemError::Classification(format!("thumbnail encode: {error}"))
            })?;
    }
    Ok(buffer)
}

fn is_lossy_mime(mime_type: &str) -> bool {
    matches!(mime_type, "image/jpeg" | "image/webp")
}

fn format_label(mime_type: &str) -> String {
    match mime_type.strip_prefix("image/") {
        Some(subtype) => subtype.to_uppercase(),
        None => mime_type.to_uppercase(),
    }
}

/// Maps a file extension to a mime type. Unknown extensions fall back to
/// `application/octet-stream`.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "txt" | "log" | "cfg" | "ini" | "conf" | "lock" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "js" | "mjs" | "cjs" => "text/javascript",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "rs" | "py" | "go" | "java" | "c" | "h" | "cpp" | "hpp" | "ts" | "tsx" | "jsx" | "sh"
        | "rb" | "swift" | "kt" | "sql" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Classifies a mime type into an entry kind.
pub fn entry_kind_for_mime(mime_type: &str) -> EntryKind {
    if mime_type.starts_with("image/") {
        return EntryKind::Image;
    }
    if mime_type == "application/pdf" {
        return EntryKind::Document;
    }
    if mime_type.starts_with("text/")
        || matches!(
            mime_type,
            "application/json" | "application/yaml" | "application/toml"
        )
    {
        return EntryKind::Text;
    }
    EntryKind::Binary
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::path::PathBuf;

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let pixels = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, alpha]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png encode");
        bytes
    }

    #[test]
    fn classify_extracts_dimensions_and_transparency() {
        let bytes = png_bytes(40, 20, 128);
        let classified = classify_image(&bytes, "image/png").expect("classify");

        assert_eq!(classified.metadata.width, 40);
        assert_eq!(classified.metadata.height, 20);
        assert!(classified.metadata.has_alpha);
        assert_eq!(
            classified.metadata.description,
            "40x20 pixels, PNG, with transparency"
        );
    }

    #[test]
    fn thumbnail_long_edge_never_exceeds_cap() {
        let bytes = png_bytes(THUMBNAIL_MAX_EDGE * 4, THUMBNAIL_MAX_EDGE * 2, 255);
        let classified = classify_image(&bytes, "image/png").expect("classify");

        let thumbnail = classified.thumbnail.expect("thumbnail");
        let decoded = image::load_from_memory(&thumbnail).expect("thumbnail decode");
        assert_eq!(decoded.width(), THUMBNAIL_MAX_EDGE);
        assert_eq!(decoded.height(), THUMBNAIL_MAX_EDGE / 2);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let bytes = png_bytes(16, 8, 255);
        let classified = classify_image(&bytes, "image/png").expect("classify");

        let thumbnail = classified.thumbnail.expect("thumbnail");
        let decoded = image::load_from_memory(&thumbnail).expect("thumbnail decode");
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn garbage_bytes_fail_classification() {
        let error = classify_image(b"not an image", "image/png").expect_err("decode should fail");
        match error {
            FilesystemError::Classification(_) => {}
            other => panic!("expected classification error, got: {other:?}"),
        }
    }

    #[test]
    fn mime_lookup_covers_core_kinds() {
        assert_eq!(mime_type_for_path(&PathBuf::from("a/b/notes.md")), "text/markdown");
        assert_eq!(mime_type_for_path(&PathBuf::from("photo.JPG")), "image/jpeg");
        assert_eq!(mime_type_for_path(&PathBuf::from("paper.pdf")), "application/pdf");
        assert_eq!(
            mime_type_for_path(&PathBuf::from("blob.bin")),
            "application/octet-stream"
        );

        assert_eq!(entry_kind_for_mime("text/markdown"), EntryKind::Text);
        assert_eq!(entry_kind_for_mime("application/json"), EntryKind::Text);
        assert_eq!(entry_kind_for_mime("image/png"), EntryKind::Image);
        assert_eq!(entry_kind_for_mime("application/pdf"), EntryKind::Document);
        assert_eq!(entry_kind_for_mime("application/octet-stream"), EntryKind::Binary);
    }
}
