use ab_glyph::{point, Font, FontArc, FontVec, PxScale, ScaleFont};
use log::{debug, warn};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("No fonts available: load system fonts or pass a font directory")]
    NoFonts,
    #[error("Font data for '{0}' could not be parsed")]
    Invalid(String),
}

/// Vertical metrics of a font at a given pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    /// Distance from the baseline to the top of the em box, positive.
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the em box, negative.
    pub descent: f32,
}

/// The glyph primitive the render engine draws through.
///
/// Implementations must be immutable once built so one instance can serve
/// every row of a batch.
pub trait TextRasterizer: Send + Sync {
    fn metrics(&self, size_px: f32) -> FontMetrics;

    /// Advance width of `text` laid out on a single line.
    fn measure(&self, text: &str, size_px: f32) -> f32;

    /// Rasterizes `text` with its baseline starting at `origin`, reporting
    /// coverage in `[0, 1]` for each touched pixel.
    fn draw(&self, text: &str, size_px: f32, origin: (f32, f32), plot: &mut dyn FnMut(i64, i64, f32));
}

/// A [`TextRasterizer`] backed by an `ab_glyph` outline font.
#[derive(Clone)]
pub struct FontRasterizer {
    font: FontArc,
    name: String,
}

impl FontRasterizer {
    pub fn new(font: FontArc, name: impl Into<String>) -> Self {
        Self {
            font,
            name: name.into(),
        }
    }

    pub fn from_bytes(data: Vec<u8>, index: u32, name: &str) -> Result<Self, FontError> {
        let font = FontVec::try_from_vec_and_index(data, index)
            .map_err(|_| FontError::Invalid(name.to_string()))?;
        Ok(Self::new(FontArc::new(font), name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // `size_px` is the em square; PxScale measures ascent-to-descent.
    fn scale(&self, size_px: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1.0);
        PxScale::from(size_px * self.font.height_unscaled() / units_per_em)
    }
}

impl TextRasterizer for FontRasterizer {
    fn metrics(&self, size_px: f32) -> FontMetrics {
        let scaled = self.font.as_scaled(self.scale(size_px));
        FontMetrics {
            ascent: scaled.ascent(),
            descent: scaled.descent(),
        }
    }

    fn measure(&self, text: &str, size_px: f32) -> f32 {
        let scaled = self.font.as_scaled(self.scale(size_px));
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }

    fn draw(&self, text: &str, size_px: f32, origin: (f32, f32), plot: &mut dyn FnMut(i64, i64, f32)) {
        let scale = self.scale(size_px);
        let scaled = self.font.as_scaled(scale);
        let mut caret = origin.0;
        let mut previous = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, origin.1));
            caret += scaled.h_advance(id);
            previous = Some(id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (min_x, min_y) = (bounds.min.x as i64, bounds.min.y as i64);
                outlined.draw(|gx, gy, coverage| {
                    plot(min_x + gx as i64, min_y + gy as i64, coverage);
                });
            }
        }
    }
}

/// Font discovery on top of a `fontdb` database.
pub struct FontManager {
    db: fontdb::Database,
}

impl FontManager {
    /// An empty manager; add sources before resolving.
    pub fn new() -> Self {
        Self {
            db: fontdb::Database::new(),
        }
    }

    pub fn with_system_fonts() -> Self {
        let mut manager = Self::new();
        manager.db.load_system_fonts();
        debug!("Loaded {} system font faces", manager.db.len());
        manager
    }

    pub fn add_font_dir<P: AsRef<Path>>(&mut self, path: P) {
        self.db.load_fonts_dir(path);
    }

    pub fn add_font_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        self.db.load_font_file(path)
    }

    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Finds the best face for `family`: the family itself, then the generic
    /// sans-serif family, then whatever face was loaded first.
    pub fn resolve(&self, family: &str) -> Result<FontRasterizer, FontError> {
        let id = match self.query(&[fontdb::Family::Name(family)]) {
            Some(id) => id,
            None => {
                let fallback = self
                    .query(&[fontdb::Family::SansSerif])
                    .or_else(|| self.db.faces().next().map(|face| face.id))
                    .ok_or(FontError::NoFonts)?;
                warn!("Font family '{}' not found, using a fallback face", family);
                fallback
            }
        };

        let name = self
            .db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| family.to_string());

        self.db
            .with_face_data(id, |data, index| FontRasterizer::from_bytes(data.to_vec(), index, &name))
            .ok_or_else(|| FontError::Invalid(name.clone()))?
    }

    fn query(&self, families: &[fontdb::Family<'_>]) -> Option<fontdb::ID> {
        self.db.query(&fontdb::Query {
            families,
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        })
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}
