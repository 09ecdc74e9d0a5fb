use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::dataset::Dataset;
use crate::engine::{RenderEngine, RenderError, Template};
use crate::export::{Artifact, ExportAdapter, ExportError};
use crate::layout::compute_draw_instruction;
use crate::resolver::resolve_text;

/// Rows completed out of the batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    /// `round(completed / total * 100)`, 0 for an empty batch.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// How often the orchestrator hands control back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldPolicy {
    every: usize,
}

impl YieldPolicy {
    pub const DEFAULT_EVERY: usize = 5;

    /// Yield after every row whose index is a multiple of `rows`; 0 disables yielding.
    pub fn every(rows: usize) -> Self {
        Self { every: rows }
    }

    pub fn never() -> Self {
        Self { every: 0 }
    }

    pub fn should_yield(&self, index: usize) -> bool {
        self.every != 0 && index % self.every == 0
    }
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self::every(Self::DEFAULT_EVERY)
    }
}

/// Cooperative cancellation flag shared between a batch and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Please complete all steps first! No template image loaded")]
    MissingTemplate,
    #[error("Please complete all steps first! The template image has no pixels")]
    EmptyTemplate,
    #[error("Please complete all steps first! The dataset has no records")]
    EmptyDataset,
    #[error("Please complete all steps first! No name column selected")]
    NoFieldSelected,
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("Rendering row {} failed: {source}", .index + 1)]
    Render {
        index: usize,
        #[source]
        source: RenderError,
    },
    #[error("Exporting row {} ('{label}') failed: {source}", .index + 1)]
    Export {
        index: usize,
        label: String,
        #[source]
        source: ExportError,
    },
    #[error("Finalizing the artifact failed: {0}")]
    Finalize(#[source] ExportError),
    #[error("Batch cancelled after {completed} rows")]
    Cancelled { completed: usize },
}

/// Verifies a batch can start, returning the template and the trimmed field key.
pub fn check_preconditions<'a>(
    template: Option<&'a Template>,
    dataset: &Dataset,
    config: &'a RenderConfig,
) -> Result<(&'a Template, &'a str), PreconditionError> {
    let template = template.ok_or(PreconditionError::MissingTemplate)?;
    if template.is_empty() {
        return Err(PreconditionError::EmptyTemplate);
    }
    if dataset.is_empty() {
        return Err(PreconditionError::EmptyDataset);
    }
    match config.field_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok((template, key)),
        _ => Err(PreconditionError::NoFieldSelected),
    }
}

/// Runs batches: one render per record, streamed into an export adapter.
pub struct BatchRunner {
    engine: RenderEngine,
    cancel: Option<CancellationToken>,
}

impl BatchRunner {
    pub fn new(engine: RenderEngine) -> Self {
        Self {
            engine,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Renders every record in ascending order and finalizes the adapter.
    ///
    /// The batch is all-or-nothing: the first failing row aborts the run and the
    /// adapter is dropped without producing an artifact.
    pub async fn run<F>(
        &self,
        template: Option<&Template>,
        dataset: &Dataset,
        config: &RenderConfig,
        mut adapter: Box<dyn ExportAdapter>,
        mut on_progress: F,
    ) -> Result<Artifact, BatchError>
    where
        F: FnMut(BatchProgress),
    {
        let config = config.clone();
        let (template, field_key) = check_preconditions(template, dataset, &config)?;
        if !dataset.has_column(field_key) {
            warn!(
                "Column '{}' not found in the data (columns: {:?}); rows will use fallback names",
                field_key,
                dataset.columns()
            );
        }

        let total = dataset.len();
        let instruction = compute_draw_instruction(
            template.width(),
            template.height(),
            config.anchor,
            &config.style,
        );
        info!(
            "Generating {} {} from a {}x{} template",
            total,
            adapter.format(),
            template.width(),
            template.height()
        );

        for (index, record) in dataset.records().iter().enumerate() {
            let text = resolve_text(record, field_key, index);
            let raster = self
                .engine
                .render_row(template, &instruction, &text)
                .map_err(|source| BatchError::Render { index, source })?;
            adapter
                .append(index, &text, raster)
                .map_err(|source| BatchError::Export {
                    index,
                    label: text.clone(),
                    source,
                })?;
            debug!("Row {}/{}: {}", index + 1, total, text);

            on_progress(BatchProgress {
                completed: index + 1,
                total,
            });

            if config.yield_policy.should_yield(index) {
                tokio::task::yield_now().await;
                if self.is_cancelled() {
                    info!("Batch cancelled after {} of {} rows", index + 1, total);
                    return Err(BatchError::Cancelled {
                        completed: index + 1,
                    });
                }
            }
        }

        if self.is_cancelled() {
            return Err(BatchError::Cancelled { completed: total });
        }

        let artifact = adapter.finalize().map_err(BatchError::Finalize)?;
        info!("Finished {} ({} bytes)", artifact.file_name, artifact.bytes.len());
        Ok(artifact)
    }
}

/// Runs one batch without cancellation support.
pub async fn run_batch<F>(
    template: Option<&Template>,
    dataset: &Dataset,
    config: &RenderConfig,
    engine: RenderEngine,
    adapter: Box<dyn ExportAdapter>,
    on_progress: F,
) -> Result<Artifact, BatchError>
where
    F: FnMut(BatchProgress),
{
    BatchRunner::new(engine)
        .run(template, dataset, config, adapter, on_progress)
        .await
}
