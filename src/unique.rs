//! Unique value combinations across selected columns.

use std::{collections::HashMap, io::Write, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use log::debug;

use crate::{
    config::{DEFAULT_QUOTE_CHAR, InferenceConfig},
    io_utils,
    schema::{ColumnMeta, ColumnType, Layout, Schema},
    source::LineSource,
    tokenizer::{self, RowReader},
};

pub const COUNT_COLUMN: &str = "count_unique";
const FALLBACK_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Value,
    Count,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "value" | "key" => Ok(SortKey::Value),
            "count" => Ok(SortKey::Count),
            other => Err(anyhow!("Unknown sort key '{other}' (expected value or count)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniqueSort {
    pub key: SortKey,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueRow {
    pub values: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueReport {
    /// Output layout; column names are stored as they appear in the header line.
    pub schema: Schema,
    pub separator: char,
    pub quote: char,
    /// Unquoted header values.
    pub headers: Vec<String>,
    pub rows: Vec<UniqueRow>,
}

impl UniqueReport {
    /// Header record followed by one record per combination.
    pub fn write<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        writer
            .write_record(&self.headers)
            .context("Writing unique-count header")?;
        for row in &self.rows {
            let count = row.count.to_string();
            writer
                .write_record(row.values.iter().map(String::as_str).chain([count.as_str()]))
                .context("Writing unique-count row")?;
        }
        writer.flush().context("Flushing unique counts")
    }

    pub fn render(&self) -> Result<String> {
        let (delimiter, quote) = self.csv_bytes()?;
        let mut writer = io_utils::csv_writer(Vec::new(), delimiter, Some(quote));
        self.write(&mut writer)?;
        let bytes = writer
            .into_inner()
            .map_err(|err| err.into_error())
            .context("Rendering unique counts")?;
        String::from_utf8(bytes).context("Rendering unique counts")
    }

    pub fn csv_bytes(&self) -> Result<(u8, u8)> {
        Ok((
            io_utils::ascii_byte(self.separator, "Separator")?,
            io_utils::ascii_byte(self.quote, "Quote character")?,
        ))
    }
}

#[derive(Debug, Default)]
struct Tally {
    order: Vec<UniqueRow>,
    positions: HashMap<Vec<String>, usize>,
}

impl Tally {
    fn record(&mut self, values: &[String]) {
        match self.positions.get(values) {
            Some(position) => self.order[*position].count += 1,
            None => {
                self.positions.insert(values.to_vec(), self.order.len());
                self.order.push(UniqueRow {
                    values: values.to_vec(),
                    count: 1,
                });
            }
        }
    }

    fn into_sorted(self, sort: Option<UniqueSort>) -> Vec<UniqueRow> {
        let mut rows = self.order;
        if let Some(sort) = sort {
            match (sort.key, sort.descending) {
                (SortKey::Value, false) => rows.sort_by(|a, b| a.values.cmp(&b.values)),
                (SortKey::Value, true) => rows.sort_by(|a, b| b.values.cmp(&a.values)),
                (SortKey::Count, false) => rows.sort_by_key(|row| row.count),
                (SortKey::Count, true) => rows.sort_by(|a, b| b.count.cmp(&a.count)),
            }
        }
        rows
    }
}

/// A column name as the csv writer puts it in a multi-field header record.
fn header_cell(name: &str, separator: char, quote: char) -> Result<String> {
    if name.is_empty() {
        return Ok(String::new());
    }
    tokenizer::join_fields(&[name], separator, Some(quote))
}

fn digit_count(value: usize) -> usize {
    value.to_string().len()
}

/// Count distinct combinations of `columns` over the data rows of `source`.
pub fn count_unique(
    source: &dyn LineSource,
    schema: &Schema,
    columns: &[usize],
    sort: Option<UniqueSort>,
    config: &InferenceConfig,
) -> Result<UniqueReport> {
    ensure!(!columns.is_empty(), "Select at least one column");
    let selected = columns
        .iter()
        .map(|index| {
            schema.columns.get(*index).ok_or_else(|| {
                anyhow!(
                    "Column index {index} is out of range ({} column(s) available)",
                    schema.columns.len()
                )
            })
        })
        .collect::<Result<Vec<&ColumnMeta>>>()?;

    let separator = schema.separator().unwrap_or(FALLBACK_SEPARATOR);
    let quote = schema.quote().unwrap_or(DEFAULT_QUOTE_CHAR);
    let mut rows = RowReader::open(source, &schema.layout, config.trim_values)?;
    if schema.has_header {
        rows.next_row()?;
    }

    let mut tally = Tally::default();
    let mut values = Vec::with_capacity(columns.len());
    while let Some(fields) = rows.next_row()? {
        values.clear();
        for index in columns {
            values.push(fields.get(*index).cloned().unwrap_or_default());
        }
        tally.record(&values);
    }
    debug!(
        "Counted {} unique combination(s) over {} row(s)",
        tally.order.len(),
        rows.rows_read()
    );

    let rows = tally.into_sorted(sort);
    let largest = rows.iter().map(|row| row.count).max().unwrap_or(0);
    let mut headers = selected
        .iter()
        .map(|column| column.name.clone())
        .collect::<Vec<_>>();
    headers.push(COUNT_COLUMN.to_string());

    let mut output_columns = Vec::with_capacity(headers.len());
    for (position, (name, column)) in headers.iter().zip(&selected).enumerate() {
        let name = header_cell(name, separator, quote)?;
        output_columns.push(ColumnMeta::new(
            position,
            name,
            ColumnType::String,
            column.max_width,
        ));
    }
    output_columns.push(ColumnMeta::new(
        output_columns.len(),
        COUNT_COLUMN,
        ColumnType::Integer,
        digit_count(largest),
    ));
    let layout = Layout::Delimited {
        separator,
        quote: Some(quote),
    };
    Ok(UniqueReport {
        schema: Schema::new(layout, true, output_columns),
        separator,
        quote,
        headers,
        rows,
    })
}
