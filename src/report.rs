//! Statistical report over every column of an input.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use itertools::Itertools;

use crate::{
    config::InferenceConfig,
    infer::field_name,
    schema::Schema,
    source::LineSource,
    stats::{ColumnStatistics, ValueRange},
    tokenizer::RowReader,
};

const DIVIDER: &str = "----------------------------------------";

/// Where and when a report was produced.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub source: String,
    pub generated: NaiveDateTime,
}

#[derive(Debug)]
pub struct Analysis<'cfg> {
    pub columns: Vec<(String, ColumnStatistics<'cfg>)>,
    pub records: usize,
    pub has_header: bool,
    config: &'cfg InferenceConfig,
}

/// Collect statistics for every column; any row may add columns.
pub fn analyze<'cfg>(
    source: &dyn LineSource,
    schema: &Schema,
    config: &'cfg InferenceConfig,
) -> Result<Analysis<'cfg>> {
    let mut rows = RowReader::open(source, &schema.layout, config.trim_values)?;
    if schema.has_header {
        rows.next_row()
            .with_context(|| format!("Reading header of {}", source.describe()))?;
    }
    let mut columns: Vec<ColumnStatistics<'cfg>> = Vec::new();
    let mut records = 0usize;
    while let Some(fields) = rows.next_row()? {
        records += 1;
        for (index, value) in fields.iter().enumerate() {
            if index == columns.len() {
                columns.push(ColumnStatistics::new(index, config));
            }
            columns[index].ingest(value);
        }
    }
    let columns = columns
        .into_iter()
        .map(|stats| {
            let name = schema
                .columns
                .get(stats.index())
                .map_or_else(|| field_name(stats.index()), |column| column.name.clone());
            (name, stats)
        })
        .collect();
    Ok(Analysis {
        columns,
        records,
        has_header: schema.has_header,
        config,
    })
}

fn percentage(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", part as f64 * 100.0 / total as f64)
}

fn format_datetime(value: NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn range_line<T>(label: &str, range: Option<ValueRange<T>>, render: impl Fn(T) -> String) -> Option<String> {
    range.map(|range| format!("{label}: {} ~ {}", render(range.min), render(range.max)))
}

impl Analysis<'_> {
    pub fn render(&self, context: &ReportContext) -> String {
        let mut out = String::new();
        let header_note = if self.has_header { " (+1 header line)" } else { "" };
        let _ = writeln!(out, "Analyze dataset");
        let _ = writeln!(out, "csv-lint-infer: v{}", env!("CARGO_PKG_VERSION"));
        let _ = writeln!(out, "File: {}", context.source);
        let _ = writeln!(out, "Date: {}", context.generated.format("%d-%b-%Y %H:%M"));
        let _ = writeln!(out);
        let _ = writeln!(out, "Data records: {}{header_note}", self.records);
        let _ = writeln!(out, "Max.unique values: {}", self.config.unique_values_max);
        let _ = writeln!(out);

        for (position, (name, stats)) in self.columns.iter().enumerate() {
            let counts = stats.counts();
            let _ = writeln!(out, "{DIVIDER}");
            let _ = writeln!(out, "{}: {name}", position + 1);

            let classes = [
                ("decimal", counts.decimal()),
                ("integer", counts.integer),
                ("string", counts.string),
                ("datetime", counts.datetime),
                ("empty", counts.empty),
            ];
            let types = classes
                .iter()
                .filter(|(_, count)| *count > 0)
                .map(|(label, count)| {
                    format!("{label} ({count} = {}%)", percentage(*count, self.records))
                })
                .join(", ");
            let _ = writeln!(out, "DataTypes      : {types}");

            if let Some(width) = stats.width_range().filter(|range| range.max > 0) {
                let text = if width.min == width.max {
                    width.max.to_string()
                } else {
                    format!("{} ~ {}", width.min, width.max)
                };
                let _ = writeln!(out, "Width range    : {text} characters");
            }
            let ranges = [
                range_line("Integer range  ", stats.integer_range(), |v| v.to_string()),
                range_line("Decimal range  ", stats.decimal_range(), |v| v.to_string()),
                range_line("DateTime range ", stats.date_range(), format_datetime),
            ];
            for line in ranges.into_iter().flatten() {
                let _ = writeln!(out, "{line}");
            }

            if let Some(values) = stats.unique_values().filter(|values| !values.is_empty()) {
                let _ = writeln!(out, "-- Unique values ({}) --", values.len());
                for (value, count) in values {
                    let _ = writeln!(out, "n={:<13}: {value}", count);
                }
            }
            let _ = writeln!(out);
        }
        out
    }
}
