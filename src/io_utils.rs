//! I/O utilities shared by the command handlers.
//!
//! - **Encoding**: input labels resolve through `encoding_rs`, defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Output**: text destinations are buffered files or stdout.
//! - **CSV**: `csv` readers and writers configured for a detected separator and quote.
//! - **Delimiters**: printable renderings of separator characters for logs and tables.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::{QuoteStyle, Terminator, Trim};
use encoding_rs::{Encoding, UTF_8};

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Open a buffered text destination; `None` or `-` writes to stdout.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(writer)
}

pub fn write_text(path: Option<&Path>, text: &str) -> Result<()> {
    let mut writer = open_output(path)?;
    writer
        .write_all(text.as_bytes())
        .context("Writing output text")?;
    writer.flush().context("Flushing output text")
}

/// Single-byte form of a separator or quote character.
pub fn ascii_byte(ch: char, role: &str) -> Result<u8> {
    u8::try_from(ch)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow!("{role} {ch:?} is not an ASCII character"))
}

/// Headerless, ragged-tolerant record reader; `quote: None` reads quotes literally.
pub fn open_csv_reader<R>(reader: R, delimiter: u8, quote: Option<u8>, trim: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .quoting(quote.is_some());
    if let Some(quote) = quote {
        builder.quote(quote);
    }
    if trim {
        builder.trim(Trim::Fields);
    }
    builder.from_reader(reader)
}

/// Quote only where a value would not read back unchanged.
pub fn csv_writer<W>(writer: W, delimiter: u8, quote: Option<u8>) -> csv::Writer<W>
where
    W: Write,
{
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'));
    match quote {
        Some(quote) => builder.quote(quote).quote_style(QuoteStyle::Necessary),
        None => builder.quote_style(QuoteStyle::Never),
    };
    builder.from_writer(writer)
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    quote: Option<u8>,
) -> Result<csv::Writer<Box<dyn Write>>> {
    Ok(csv_writer(open_output(path)?, delimiter, quote))
}

pub fn printable_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        ' ' => "space".to_string(),
        other if (other as u32) < 32 => format!("\\u{:04x}", other as u32),
        other => other.to_string(),
    }
}
