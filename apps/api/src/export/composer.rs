//! Composition stage: places a bitmap onto a single fixed-width PDF page.
//!
//! The page width is fixed (A4 portrait by default) and the page height is
//! derived from the bitmap so the aspect ratio is preserved:
//! `page_height = bitmap.height * page_width / bitmap.width`.
//!
//! This is a single-page, no-pagination policy: content taller than one
//! physical page produces one overlong page, not several. The exported PDF
//! is an image with no text layer.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::export::{Bitmap, ExportError};
use crate::models::export::PageDimensions;

const MM_PER_INCH: f32 = 25.4;
const PT_PER_INCH: f32 = 72.0;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_INCH / MM_PER_INCH
}

/// A finished document: PDF bytes plus the dimensions of each page, in
/// composition order. Exists only until it is saved.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub bytes: Vec<u8>,
    pub pages: Vec<PageDimensions>,
}

/// Composes `bitmap` onto one page of physical width `page_width_mm`.
pub fn compose(bitmap: &Bitmap, page_width_mm: f32) -> Result<ComposedDocument, ExportError> {
    if !(page_width_mm > 0.0) {
        return Err(ExportError::EncodingFailed(format!(
            "page width must be positive, got {page_width_mm}mm"
        )));
    }
    bitmap.validate().map_err(ExportError::EncodingFailed)?;

    let page_height_mm = bitmap.aspect_ratio() * page_width_mm;
    let page_width_pt = mm_to_pt(page_width_mm);
    let page_height_pt = mm_to_pt(page_height_mm);

    let mut document = Document::with_version("1.7");
    let pages_id = document.new_object_id();

    // The bitmap becomes a DeviceRGB image XObject with a Flate-compressed
    // pixel stream.
    let image_id = document.add_object(image_xobject(bitmap)?);
    let resources_id = document.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });

    // Scale the unit image square to span the full page.
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_width_pt.into(),
                    0.0.into(),
                    0.0.into(),
                    page_height_pt.into(),
                    0.0.into(),
                    0.0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::EncodingFailed(format!("content stream: {e}")))?;
    let content_id = document.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.0.into(), 0.0.into(), page_width_pt.into(), page_height_pt.into()],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .map_err(|e| ExportError::EncodingFailed(format!("document serialization: {e}")))?;

    Ok(ComposedDocument {
        bytes,
        pages: vec![PageDimensions {
            width_mm: page_width_mm,
            height_mm: page_height_mm,
        }],
    })
}

fn image_xobject(bitmap: &Bitmap) -> Result<Stream, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&bitmap.data)
        .map_err(|e| ExportError::EncodingFailed(format!("image stream: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ExportError::EncodingFailed(format!("image stream: {e}")))?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => bitmap.width as i64,
            "Height" => bitmap.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compressed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(width: u32, height: u32) -> Bitmap {
        Bitmap {
            width,
            height,
            scale: 2.0,
            data: vec![0x80; Bitmap::expected_len(width, height)],
        }
    }

    #[test]
    fn test_nominal_a4_page_height() {
        // 1600x2400 at 210mm wide → 2400 * 210 / 1600 = 315mm.
        let doc = compose(&bitmap(1600, 2400), 210.0).unwrap();
        assert_eq!(doc.pages.len(), 1);
        let page = doc.pages[0];
        assert!((page.width_mm - 210.0).abs() < 1e-3);
        assert!((page.height_mm - 315.0).abs() < 1e-3);
    }

    #[test]
    fn test_aspect_ratio_preserved() {
        let bitmap = bitmap(1234, 777);
        let doc = compose(&bitmap, 210.0).unwrap();
        let page = doc.pages[0];
        let page_ratio = page.height_mm / page.width_mm;
        assert!((page_ratio - bitmap.aspect_ratio()).abs() < 1e-4);
    }

    #[test]
    fn test_oversized_content_still_one_page() {
        // Far taller than A4 (297mm): single-page policy yields one overlong
        // page rather than slicing.
        let doc = compose(&bitmap(800, 4000), 210.0).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.pages[0].height_mm > 297.0);

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_output_is_a_parseable_pdf() {
        let doc = compose(&bitmap(16, 24), 210.0).unwrap();
        assert!(doc.bytes.starts_with(b"%PDF-1.7"));

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_malformed_bitmap_is_encoding_failure() {
        let malformed = Bitmap {
            width: 16,
            height: 24,
            scale: 2.0,
            data: vec![0u8; 5],
        };
        let err = compose(&malformed, 210.0).unwrap_err();
        assert!(matches!(err, ExportError::EncodingFailed(_)));
    }

    #[test]
    fn test_zero_area_bitmap_is_encoding_failure() {
        let empty = Bitmap {
            width: 0,
            height: 0,
            scale: 2.0,
            data: Vec::new(),
        };
        assert!(matches!(
            compose(&empty, 210.0).unwrap_err(),
            ExportError::EncodingFailed(_)
        ));
    }

    #[test]
    fn test_non_positive_page_width_rejected() {
        assert!(matches!(
            compose(&bitmap(16, 24), 0.0).unwrap_err(),
            ExportError::EncodingFailed(_)
        ));
    }

    #[test]
    fn test_mm_to_pt() {
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-4);
        assert!((mm_to_pt(210.0) - 595.275_6).abs() < 1e-2);
    }
}
