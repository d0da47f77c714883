//! Schema inference pipeline.
//!
//! 1. Sample the head of the input and detect the layout (unless overridden).
//! 2. Stream every row through the tokenizer into per-column statistics; the
//!    column count is fixed by the first row.
//! 3. Decide datatypes, then decide whether the first row held column names.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    config::InferenceConfig,
    data, detect, frequency,
    schema::{ColumnMeta, ColumnType, Layout, Schema},
    source::LineSource,
    stats::ColumnStatistics,
    tokenizer::RowReader,
};

/// Evidence gathered from the first row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderVerdict {
    /// Row-1 values that do not conform to their column's inferred type.
    pub evidence: usize,
    pub all_strings: bool,
    pub empty_name: bool,
}

impl HeaderVerdict {
    pub fn has_header(&self) -> bool {
        (self.all_strings || self.evidence > 0) && !self.empty_name
    }
}

/// Judge row 1 against the finalized columns; their names are the row-1 values.
pub fn detect_header(columns: &[ColumnMeta], config: &InferenceConfig) -> HeaderVerdict {
    let mut verdict = HeaderVerdict {
        all_strings: true,
        ..HeaderVerdict::default()
    };
    for column in columns {
        if column.name.trim().is_empty() {
            verdict.empty_name = true;
        }
        if column.datatype == ColumnType::String {
            continue;
        }
        verdict.all_strings = false;
        if !data::conforms(column, &column.name, config) {
            verdict.evidence += 1;
        }
    }
    verdict
}

pub fn field_name(index: usize) -> String {
    format!("FIELD{}", index + 1)
}

/// Resolve the layout from overrides or by sampling the source.
pub fn resolve_layout(source: &dyn LineSource, config: &InferenceConfig) -> Result<Layout> {
    if let Some(separator) = config.overrides.separator {
        debug!("Using manual separator {separator:?}");
        return Ok(Layout::Delimited {
            separator,
            quote: config.quote(),
        });
    }
    if let Some(widths) = &config.overrides.field_widths {
        debug!("Using manual field widths {widths:?}");
        return Ok(Layout::FixedWidth {
            widths: widths.clone(),
        });
    }
    let sample = frequency::sample(source, config.quote())
        .with_context(|| format!("Sampling {}", source.describe()))?;
    Ok(detect::detect_layout(&sample, config))
}

fn collect_statistics<'cfg>(
    source: &dyn LineSource,
    layout: &Layout,
    config: &'cfg InferenceConfig,
) -> Result<Vec<ColumnStatistics<'cfg>>> {
    let mut rows = RowReader::open(source, layout, config.trim_values)?;
    let mut columns: Vec<ColumnStatistics<'cfg>> = Vec::new();
    while let Some(fields) = rows
        .next_row()
        .with_context(|| format!("Reading row {} of {}", rows.rows_read() + 1, source.describe()))?
    {
        if rows.rows_read() == 1 {
            columns = (0..fields.len())
                .map(|index| ColumnStatistics::new(index, config))
                .collect();
        }
        for (column, value) in columns.iter_mut().zip(&fields) {
            column.ingest(value);
        }
    }
    debug!(
        "Collected statistics for {} column(s) over {} row(s)",
        columns.len(),
        rows.rows_read()
    );
    Ok(columns)
}

pub fn infer_schema(source: &dyn LineSource, config: &InferenceConfig) -> Result<Schema> {
    config.validate().context("Invalid inference configuration")?;
    let layout = resolve_layout(source, config)?;
    info!("Detected layout for {}: {}", source.describe(), layout.describe());

    match layout {
        Layout::NonTabular { kind } => return Ok(Schema::non_tabular(kind)),
        Layout::Undetermined => return Ok(Schema::undetermined()),
        _ => {}
    }

    let mut statistics = collect_statistics(source, &layout, config)?;
    let mut columns = statistics
        .iter_mut()
        .map(ColumnStatistics::finalize)
        .collect::<Vec<_>>();
    if let Some(widths) = layout.field_widths() {
        for (column, width) in columns.iter_mut().zip(widths) {
            column.max_width = *width;
        }
    }

    let verdict = detect_header(&columns, config);
    debug!("Header verdict: {verdict:?}");
    let has_header = config.overrides.has_header.unwrap_or(verdict.has_header());
    if !has_header {
        for column in &mut columns {
            column.name = field_name(column.index);
        }
    }

    Ok(Schema::new(layout, has_header, columns))
}
