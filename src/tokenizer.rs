//! Row tokenizer.
//!
//! Splits input into field values for a detected [`Layout`]. Delimited rows go
//! through the `csv` crate: a quote opens only at the start of a field, a doubled
//! quote inside a quoted value is a literal quote, and a quoted value may run
//! across line breaks. Blank lines between delimited records are skipped. Fixed
//! width rows are sliced by character count and always yield one value per
//! declared width.

use std::io::BufRead;

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::{
    io_utils,
    schema::Layout,
    source::{LineReader, LineSource},
};

fn apply_trim(mut fields: Vec<String>, trim: bool) -> Vec<String> {
    if trim {
        for field in &mut fields {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
    }
    fields
}

fn split_fixed(widths: &[usize], line: &str, trim: bool) -> Vec<String> {
    let chars = line.chars().collect::<Vec<_>>();
    let mut fields = Vec::with_capacity(widths.len());
    let mut start = 0;
    for (idx, width) in widths.iter().enumerate() {
        let end = if idx + 1 == widths.len() {
            chars.len()
        } else {
            (start + width).min(chars.len())
        };
        let value = chars[start..end].iter().collect::<String>();
        fields.push(value);
        start = end;
    }
    apply_trim(fields, trim)
}

fn csv_bytes(separator: char, quote: Option<char>) -> Result<(u8, Option<u8>)> {
    let delimiter = io_utils::ascii_byte(separator, "Separator")?;
    let quote = quote
        .map(|quote| io_utils::ascii_byte(quote, "Quote character"))
        .transpose()?;
    Ok((delimiter, quote))
}

fn record_fields(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

/// Split a single physical line. An unterminated quote swallows the rest of the line.
pub fn split_line(layout: &Layout, line: &str, trim: bool) -> Result<Vec<String>> {
    match layout {
        Layout::Delimited { separator, quote } => {
            let (delimiter, quote) = csv_bytes(*separator, *quote)?;
            let mut reader = io_utils::open_csv_reader(line.as_bytes(), delimiter, quote, trim);
            let mut record = StringRecord::new();
            if !reader
                .read_record(&mut record)
                .context("Splitting delimited line")?
            {
                return Ok(vec![String::new()]);
            }
            Ok(record_fields(&record))
        }
        Layout::FixedWidth { widths } => Ok(split_fixed(widths, line, trim)),
        Layout::NonTabular { .. } | Layout::Undetermined => {
            Ok(apply_trim(vec![line.to_string()], trim))
        }
    }
}

/// Inverse of [`split_line`] for delimited rows.
pub fn join_fields<S: AsRef<str>>(
    fields: &[S],
    separator: char,
    quote: Option<char>,
) -> Result<String> {
    let (delimiter, quote) = csv_bytes(separator, quote)?;
    let mut writer = io_utils::csv_writer(Vec::new(), delimiter, quote);
    writer
        .write_record(fields.iter().map(AsRef::<str>::as_ref))
        .context("Encoding delimited row")?;
    let bytes = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("Encoding delimited row")?;
    let mut line = String::from_utf8(bytes).context("Encoding delimited row")?;
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
    Ok(line)
}

enum Records {
    Delimited {
        reader: csv::Reader<Box<dyn BufRead>>,
        record: StringRecord,
    },
    Lines(LineReader),
}

/// Pulls records from an opened source for one layout.
pub struct RowReader<'a> {
    records: Records,
    layout: &'a Layout,
    trim: bool,
    rows: usize,
}

impl<'a> RowReader<'a> {
    pub fn new(lines: LineReader, layout: &'a Layout, trim: bool) -> Result<Self> {
        let records = match layout {
            Layout::Delimited { separator, quote } => {
                let (delimiter, quote) = csv_bytes(*separator, *quote)?;
                Records::Delimited {
                    reader: io_utils::open_csv_reader(lines.into_inner(), delimiter, quote, trim),
                    record: StringRecord::new(),
                }
            }
            _ => Records::Lines(lines),
        };
        Ok(Self {
            records,
            layout,
            trim,
            rows: 0,
        })
    }

    /// Open `source` from its first line.
    pub fn open(source: &dyn LineSource, layout: &'a Layout, trim: bool) -> Result<Self> {
        Self::new(source.open()?, layout, trim)
            .with_context(|| format!("Preparing rows of {}", source.describe()))
    }

    /// Records returned so far.
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let fields = match &mut self.records {
            Records::Delimited { reader, record } => {
                if !reader.read_record(record)? {
                    return Ok(None);
                }
                record_fields(record)
            }
            Records::Lines(lines) => {
                let Some(line) = lines.next_line()? else {
                    return Ok(None);
                };
                split_line(self.layout, &line, self.trim)?
            }
        };
        self.rows += 1;
        Ok(Some(fields))
    }
}

impl Iterator for RowReader<'_> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
