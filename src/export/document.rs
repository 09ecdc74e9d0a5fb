use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::{check_raster, Artifact, ExportAdapter, ExportError, ExportFormat};
use crate::engine::RenderResult;

/// JPEG quality used for embedded page images.
pub const JPEG_QUALITY: u8 = 95;

// Template pixels are CSS pixels: 96 per inch against 72 points per inch.
const PT_PER_PX: f32 = 72.0 / 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Builds a multi-page PDF, one full-bleed JPEG page per row.
///
/// Page size and orientation are fixed from the template when the adapter is
/// created and reused for every page.
pub struct DocumentAdapter {
    document: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    width_px: u32,
    height_px: u32,
    orientation: Orientation,
}

impl DocumentAdapter {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();

        Self {
            document,
            pages_id,
            page_ids: Vec::new(),
            width_px,
            height_px,
            orientation: Orientation::for_dimensions(width_px, height_px),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page size in points, long edge first for landscape pages.
    pub fn page_size_pt(&self) -> (f32, f32) {
        let (w, h) = (
            self.width_px as f32 * PT_PER_PX,
            self.height_px as f32 * PT_PER_PX,
        );
        match self.orientation {
            Orientation::Landscape => (w.max(h), w.min(h)),
            Orientation::Portrait => (w.min(h), w.max(h)),
        }
    }

    fn encode_jpeg(raster: RenderResult) -> Result<Vec<u8>, ExportError> {
        // JPEG has no alpha channel; transparent template areas come out black.
        let rgb = DynamicImage::ImageRgba8(raster.into_image()).to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&rgb)?;
        Ok(bytes)
    }
}

impl ExportAdapter for DocumentAdapter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn append(&mut self, index: usize, label: &str, raster: RenderResult) -> Result<(), ExportError> {
        check_raster(index, &raster)?;
        let actual = (raster.width(), raster.height());
        if actual != (self.width_px, self.height_px) {
            return Err(ExportError::SizeMismatch {
                index,
                expected: (self.width_px, self.height_px),
                actual,
            });
        }

        let jpeg = Self::encode_jpeg(raster)?;
        let jpeg_len = jpeg.len();
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width_px as i64,
                "Height" => self.height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = self.document.add_object(image_stream);

        let (page_w, page_h) = self.page_size_pt();
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_w.into(),
                        0.into(),
                        0.into(),
                        page_h.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.document.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        self.page_ids.push(page_id);
        debug!("Added page {} for '{}' ({} byte image)", self.page_ids.len(), label, jpeg_len);
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<Artifact, ExportError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.document.save_to(&mut bytes)?;
        Ok(Artifact {
            file_name: ExportFormat::Pdf.file_name().to_string(),
            media_type: "application/pdf",
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn raster(width: u32, height: u32, shade: u8) -> RenderResult {
        RenderResult::new(RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255])))
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(Orientation::for_dimensions(1000, 600), Orientation::Landscape);
        assert_eq!(Orientation::for_dimensions(600, 1000), Orientation::Portrait);
        assert_eq!(Orientation::for_dimensions(500, 500), Orientation::Portrait);
    }

    #[test]
    fn test_landscape_template_gives_landscape_pages() {
        let mut adapter = Box::new(DocumentAdapter::new(1000, 600));
        assert_eq!(adapter.orientation(), Orientation::Landscape);
        assert_eq!(adapter.page_size_pt(), (750.0, 450.0));

        for (i, shade) in [0u8, 100, 200].into_iter().enumerate() {
            adapter.append(i, &format!("Row {}", i), raster(1000, 600, shade)).unwrap();
        }
        assert_eq!(adapter.page_count(), 3);

        let artifact = adapter.finalize().unwrap();
        assert_eq!(artifact.file_name, "certificates.pdf");
        assert!(artifact.bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        for page_id in pages.values() {
            let mb = media_box(&doc, *page_id);
            assert_eq!(mb, vec![0.0, 0.0, 750.0, 450.0]);
            assert!(mb[2] > mb[3]);
        }
    }

    #[test]
    fn test_pages_follow_append_order() {
        let mut adapter = Box::new(DocumentAdapter::new(20, 40));
        assert_eq!(adapter.orientation(), Orientation::Portrait);
        let mut image_sizes = Vec::new();
        for (i, shade) in [0u8, 128, 255].into_iter().enumerate() {
            let jpeg = DocumentAdapter::encode_jpeg(raster(20, 40, shade)).unwrap();
            image_sizes.push(jpeg.len() as i64);
            adapter.append(i, "x", raster(20, 40, shade)).unwrap();
        }

        let artifact = adapter.finalize().unwrap();
        let doc = Document::load_mem(&artifact.bytes).unwrap();

        let embedded: Vec<i64> = doc
            .get_pages()
            .values()
            .map(|page_id| {
                let resources = doc.get_dictionary(*page_id).unwrap().get(b"Resources").unwrap();
                let xobjects = resources.as_dict().unwrap().get(b"XObject").unwrap();
                let image_ref = xobjects.as_dict().unwrap().get(b"Im0").unwrap();
                let stream = doc
                    .get_object(image_ref.as_reference().unwrap())
                    .unwrap()
                    .as_stream()
                    .unwrap();
                stream.content.len() as i64
            })
            .collect();
        assert_eq!(embedded, image_sizes);
    }

    #[test]
    fn test_rejects_mismatched_raster() {
        let mut adapter = DocumentAdapter::new(100, 50);
        let err = adapter.append(2, "Bob", raster(50, 100, 0)).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SizeMismatch { index: 2, expected: (100, 50), actual: (50, 100) }
        ));
        assert_eq!(adapter.page_count(), 0);
    }

    #[test]
    fn test_rejects_empty_raster() {
        let mut adapter = DocumentAdapter::new(0, 0);
        let err = adapter.append(0, "Bob", raster(0, 0, 0)).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRaster { index: 0 }));
    }
}
