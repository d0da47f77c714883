use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer the layout, header and column types of tabular text files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect separator or fixed widths, header row and column datatypes
    Infer(InferArgs),
    /// Print a statistical report for every column
    Analyze(AnalyzeArgs),
    /// Count unique value combinations across selected columns
    Unique(UniqueArgs),
}

/// Options shared by every command that may need to infer a schema.
#[derive(Debug, Args, Clone, Default)]
pub struct InferenceOptions {
    /// YAML file with inference settings
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Column separator, skipping detection (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter, conflicts_with = "widths")]
    pub separator: Option<char>,
    /// Comma-separated fixed column widths, skipping detection
    #[arg(long, value_delimiter = ',')]
    pub widths: Option<Vec<usize>>,
    /// Whether the first row holds column names, skipping header detection
    #[arg(long)]
    pub header: Option<bool>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Input file to inspect ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema YAML file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub options: InferenceOptions,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Input file to analyze ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Existing schema file; inferred when omitted
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub options: InferenceOptions,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SortBy {
    Value,
    Count,
}

#[derive(Debug, Args)]
pub struct UniqueArgs {
    /// Input file to scan ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Columns to combine, by name or 1-based position
    #[arg(short = 'C', long = "columns", value_delimiter = ',', required = true)]
    pub columns: Vec<String>,
    /// Sort the combinations by value or by count
    #[arg(long, value_enum)]
    pub sort: Option<SortBy>,
    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,
    /// Existing schema file; inferred when omitted
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Output file for the unique counts (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Also write the schema of the unique counts to this YAML file
    #[arg(long = "output-schema")]
    pub output_schema: Option<PathBuf>,
    #[command(flatten)]
    pub options: InferenceOptions,
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        "space" => Ok(' '),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            Ok(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names() {
        assert_eq!(parse_delimiter("tab"), Ok('\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(';'));
        assert_eq!(parse_delimiter("#"), Ok('#'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn unique_args_parse() {
        let cli = Cli::try_parse_from([
            "csv-lint-infer",
            "unique",
            "-i",
            "data.csv",
            "-C",
            "city,2",
            "--sort",
            "count",
            "--desc",
        ])
        .expect("parse");
        let Commands::Unique(args) = cli.command else {
            panic!("expected unique command");
        };
        assert_eq!(args.columns, vec!["city", "2"]);
        assert_eq!(args.sort, Some(SortBy::Count));
        assert!(args.desc);
    }

    #[test]
    fn separator_conflicts_with_widths() {
        let result = Cli::try_parse_from([
            "csv-lint-infer",
            "infer",
            "-i",
            "x",
            "--separator",
            ";",
            "--widths",
            "2,3",
        ]);
        assert!(result.is_err());
    }
}
