use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Horizontal interpretation of the anchor's x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// The anchor is the left edge of the text.
    #[serde(alias = "left")]
    Start,
    /// The anchor is the horizontal midpoint of the text.
    #[default]
    Center,
    /// The anchor is the right edge of the text.
    #[serde(alias = "right")]
    End,
}

impl FromStr for Alignment {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "left" => Ok(Alignment::Start),
            "center" | "centre" | "middle" => Ok(Alignment::Center),
            "end" | "right" => Ok(Alignment::End),
            other => Err(LayoutError::InvalidAlignment(other.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LayoutError {
    #[error("Invalid color '{0}': expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor(String),
    #[error("Invalid alignment '{0}': expected start, center or end")]
    InvalidAlignment(String),
}

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, LayoutError> {
        let invalid = || LayoutError::InvalidColor(hex.to_string());
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                    rgb[i] = v * 17;
                }
                Ok(Self::rgb(rgb[0], rgb[1], rgb[2]))
            }
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0x1a, 0x1a, 0x1a)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Font and color settings applied to the rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size_px: f32,
    pub font_family: String,
    pub color: Color,
    pub alignment: Alignment,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size_px: 80.0,
            font_family: "Poppins".to_string(),
            color: Color::default(),
            alignment: Alignment::Center,
        }
    }
}

/// Normalized text position relative to the template, always inside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x: f32,
    y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl<'de> Deserialize<'de> for Anchor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default = "half")]
            x: f32,
            #[serde(default = "half")]
            y: f32,
        }
        fn half() -> f32 {
            0.5
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(Anchor::new(raw.x, raw.y))
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Absolute position and style for one render.
///
/// `x` is interpreted according to `style.alignment`; `y` is the vertical
/// center of the text line.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
}

impl DrawInstruction {
    /// Left edge of a line of text `text_width` pixels wide.
    pub fn origin_x(&self, text_width: f32) -> f32 {
        match self.style.alignment {
            Alignment::Start => self.x,
            Alignment::Center => self.x - text_width / 2.0,
            Alignment::End => self.x - text_width,
        }
    }

    /// Baseline that centers the em box (ascent above, descent below, descent
    /// negative) on `y`.
    pub fn baseline_y(&self, ascent: f32, descent: f32) -> f32 {
        self.y + (ascent + descent) / 2.0
    }
}

/// Maps template dimensions, anchor and style to an absolute draw instruction.
pub fn compute_draw_instruction(
    template_width: u32,
    template_height: u32,
    anchor: Anchor,
    style: &TextStyle,
) -> DrawInstruction {
    DrawInstruction {
        x: template_width as f32 * anchor.x(),
        y: template_height as f32 * anchor.y(),
        style: style.clone(),
    }
}
