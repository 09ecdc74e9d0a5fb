use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::batch::YieldPolicy;
use crate::export::ExportFormat;
use crate::layout::{Alignment, Anchor, Color, TextStyle};

/// Contents of a `certbatch.yaml` file. Every key is optional.
#[derive(Debug, Deserialize)]
pub struct BatchConfig {
    pub template: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub field: Option<String>,
    #[serde(default)]
    pub formats: Vec<ExportFormat>,
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub style: StyleConfig,

    #[serde(default)]
    pub anchor: Anchor,

    #[serde(default)]
    pub fonts: FontConfig,

    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            template: None,
            data: None,
            field: None,
            formats: Vec::new(),
            output: None,
            style: StyleConfig::default(),
            anchor: Anchor::default(),
            fonts: FontConfig::default(),
            yield_every: default_yield_every(),
        }
    }
}

fn default_yield_every() -> usize {
    YieldPolicy::DEFAULT_EVERY
}

#[derive(Debug, Deserialize, Clone)]
pub struct StyleConfig {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub align: Alignment,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            font_family: default_font_family(),
            color: Color::default(),
            align: Alignment::default(),
        }
    }
}

fn default_font_size() -> f32 {
    80.0
}

fn default_font_family() -> String {
    "Poppins".to_string()
}

impl From<StyleConfig> for TextStyle {
    fn from(style: StyleConfig) -> Self {
        TextStyle {
            font_size_px: style.font_size,
            font_family: style.font_family,
            color: style.color,
            alignment: style.align,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FontConfig {
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default = "default_system_fonts")]
    pub system: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            files: Vec::new(),
            system: default_system_fonts(),
        }
    }
}

fn default_system_fonts() -> bool {
    true
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid font size {0}: must be a positive number")]
    InvalidFontSize(f32),
}

impl BatchConfig {
    /// Loads a config file; relative paths inside it resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.rebase(base);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let size = self.style.font_size;
        if !(size.is_finite() && size > 0.0) {
            return Err(ConfigError::InvalidFontSize(size));
        }
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        let paths = self
            .template
            .iter_mut()
            .chain(self.data.iter_mut())
            .chain(self.output.iter_mut())
            .chain(self.fonts.dirs.iter_mut())
            .chain(self.fonts.files.iter_mut());
        for path in paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Captures the settings a batch run reads into an immutable snapshot.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            field_key: self.field.clone(),
            style: self.style.clone().into(),
            anchor: self.anchor,
            yield_policy: YieldPolicy::every(self.yield_every),
        }
    }
}

/// Everything a batch run reads besides the template and the dataset.
///
/// Taken by value at batch start, so later edits never reach a running batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub field_key: Option<String>,
    pub style: TextStyle,
    pub anchor: Anchor,
    pub yield_policy: YieldPolicy,
}

impl RenderConfig {
    pub fn new(field_key: impl Into<String>) -> Self {
        Self {
            field_key: Some(field_key.into()),
            ..Self::default()
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            field_key: None,
            style: TextStyle::default(),
            anchor: Anchor::default(),
            yield_policy: YieldPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BatchConfig::from_yaml("{}").unwrap();
        assert!(config.template.is_none());
        assert!(config.formats.is_empty());
        assert_eq!(config.yield_every, 5);
        assert!(config.fonts.system);

        let render = config.render_config();
        assert_eq!(render.style, TextStyle::default());
        assert_eq!(render.anchor, Anchor::default());
        assert_eq!(render.field_key, None);
    }

    #[test]
    fn test_default_matches_empty_yaml() {
        let from_yaml = BatchConfig::from_yaml("{}").unwrap().render_config();
        assert_eq!(BatchConfig::default().render_config(), from_yaml);
    }

    #[test]
    fn test_full_config() {
        let yaml = r##"
template: template.png
data: data.csv
field: Name
formats: [png, pdf-batch]
style:
  font_size: 48
  font_family: DejaVu Sans
  color: "#ff0000"
  align: left
anchor: { x: 0.25, y: 1.5 }
yield_every: 10
"##;
        let config = BatchConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.formats, vec![ExportFormat::Png, ExportFormat::Pdf]);

        let render = config.render_config();
        assert_eq!(render.field_key.as_deref(), Some("Name"));
        assert_eq!(render.style.font_size_px, 48.0);
        assert_eq!(render.style.font_family, "DejaVu Sans");
        assert_eq!(render.style.color, Color::rgb(255, 0, 0));
        assert_eq!(render.style.alignment, Alignment::Start);
        assert_eq!((render.anchor.x(), render.anchor.y()), (0.25, 1.0));
        assert_eq!(render.yield_policy, YieldPolicy::every(10));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            BatchConfig::from_yaml("style: { color: 'blue' }"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            BatchConfig::from_yaml("style: { font_size: 0 }"),
            Err(ConfigError::InvalidFontSize(_))
        ));
        assert!(matches!(
            BatchConfig::from_yaml("formats: [gif]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certbatch.yaml");
        std::fs::write(&path, "template: assets/template.png\noutput: /abs/out\n").unwrap();

        let config = BatchConfig::load(&path).unwrap();
        assert_eq!(config.template.unwrap(), dir.path().join("assets/template.png"));
        assert_eq!(config.output.unwrap(), PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_render_config_snapshot_is_independent() {
        let mut config = BatchConfig::from_yaml("field: Name").unwrap();
        let snapshot = config.render_config();
        config.field = Some("Other".to_string());
        config.style.font_size = 12.0;
        assert_eq!(snapshot.field_key.as_deref(), Some("Name"));
        assert_eq!(snapshot.style.font_size_px, 80.0);
    }
}
