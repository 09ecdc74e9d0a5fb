//! Batch rendering of one template image against rows of tabular data.
//!
//! Each row's display text is resolved from a selected column, drawn onto a
//! copy of the template and handed to an export adapter, which bundles the
//! results into a zip of PNGs or a multi-page PDF.

pub mod batch;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod export;
pub mod fonts;
pub mod layout;
pub mod resolver;

pub use batch::{
    check_preconditions, run_batch, BatchError, BatchProgress, BatchRunner, CancellationToken,
    PreconditionError, YieldPolicy,
};
pub use config::{BatchConfig, ConfigError, RenderConfig};
pub use dataset::{Dataset, DatasetError};
pub use engine::{RenderEngine, RenderError, RenderResult, Template};
pub use export::{
    ArchiveAdapter, Artifact, DocumentAdapter, ExportAdapter, ExportError, ExportFormat,
    Orientation,
};
pub use fonts::{FontError, FontManager, FontMetrics, FontRasterizer, TextRasterizer};
pub use layout::{compute_draw_instruction, Alignment, Anchor, Color, DrawInstruction, TextStyle};
pub use resolver::{resolve_text, sanitize_label, Record};
