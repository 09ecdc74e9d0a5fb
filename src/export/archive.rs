use image::ImageFormat;
use log::debug;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{check_raster, Artifact, ExportAdapter, ExportError, ExportFormat};
use crate::engine::RenderResult;
use crate::resolver::sanitize_label;

/// Archive entry name for a row: `{row number, 3-digit padded}_{label}.png`.
pub fn entry_name(index: usize, label: &str) -> String {
    format!("{:03}_{}.png", index + 1, sanitize_label(label))
}

/// Collects rows as PNG entries of an in-memory zip archive.
pub struct ArchiveAdapter {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ArchiveAdapter {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }
}

impl Default for ArchiveAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportAdapter for ArchiveAdapter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Png
    }

    fn append(&mut self, index: usize, label: &str, raster: RenderResult) -> Result<(), ExportError> {
        check_raster(index, &raster)?;

        let mut png = Cursor::new(Vec::new());
        raster.image().write_to(&mut png, ImageFormat::Png)?;
        drop(raster);

        let name = entry_name(index, label);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(png.get_ref())?;
        self.entries += 1;
        debug!("Added {} ({} bytes)", name, png.get_ref().len());
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Artifact, ExportError> {
        let bytes = self.writer.finish()?.into_inner();
        Ok(Artifact {
            file_name: ExportFormat::Png.file_name().to_string(),
            media_type: "application/zip",
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Read;
    use zip::ZipArchive;

    fn raster(width: u32, height: u32) -> RenderResult {
        RenderResult::new(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name(0, "Jo Doe!"), "001_Jo_Doe_.png");
        assert_eq!(entry_name(41, "Alice"), "042_Alice.png");
        assert_eq!(entry_name(1233, "Bob"), "1234_Bob.png");
        assert_eq!(entry_name(2, ""), "003__.png");
    }

    #[test]
    fn test_archive_preserves_append_order() {
        let mut adapter = Box::new(ArchiveAdapter::new());
        for (i, name) in ["Carol", "Alice", "Bob"].iter().enumerate() {
            adapter.append(i, name, raster(8, 4)).unwrap();
        }
        assert_eq!(adapter.entries(), 3);

        let artifact = adapter.finalize().unwrap();
        assert_eq!(artifact.file_name, "certificates.zip");
        assert_eq!(artifact.media_type, "application/zip");

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        let ordered: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(ordered, vec!["001_Carol.png", "002_Alice.png", "003_Bob.png"]);
    }

    #[test]
    fn test_archive_entries_are_decodable_png() {
        let mut adapter = Box::new(ArchiveAdapter::new());
        adapter.append(0, "Alice", raster(8, 4)).unwrap();
        let artifact = adapter.finalize().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        let mut entry = archive.by_index(0).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(*decoded.get_pixel(3, 2), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_archive_rejects_empty_raster() {
        let mut adapter = ArchiveAdapter::new();
        let err = adapter.append(5, "Alice", raster(0, 4)).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRaster { index: 5 }));
        assert_eq!(adapter.entries(), 0);
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let artifact = Box::new(ArchiveAdapter::new()).finalize().unwrap();
        let archive = ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
