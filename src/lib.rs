pub mod cli;
pub mod config;
pub mod data;
pub mod detect;
pub mod fixed_width;
pub mod frequency;
pub mod infer;
pub mod io_utils;
pub mod report;
pub mod schema;
pub mod source;
pub mod stats;
pub mod table;
pub mod tokenizer;
pub mod unique;
pub mod yaml_provider;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InferenceOptions, SortBy},
    config::InferenceConfig,
    report::ReportContext,
    schema::Schema,
    source::LineSource,
    table::{Alignment, TextTable},
    unique::{SortKey, UniqueSort},
};

pub use crate::infer::infer_schema;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_lint_infer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Infer(args) => handle_infer(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Unique(args) => handle_unique(&args),
    }
}

/// Merge the config file (if any) with command-line overrides.
pub fn build_config(options: &InferenceOptions) -> Result<InferenceConfig> {
    let mut config = match &options.config {
        Some(path) => InferenceConfig::load(path)?,
        None => InferenceConfig::default(),
    };
    if let Some(separator) = options.separator {
        config.overrides.separator = Some(separator);
        config.overrides.field_widths = None;
    }
    if let Some(widths) = &options.widths {
        config.overrides.field_widths = Some(widths.clone());
        config.overrides.separator = None;
    }
    if let Some(header) = options.header {
        config.overrides.has_header = Some(header);
    }
    config.validate().context("Invalid inference options")?;
    Ok(config)
}

fn open_source(input: &std::path::Path, options: &InferenceOptions) -> Result<Box<dyn LineSource>> {
    let encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    source::open_input(input, Some(encoding))
}

fn load_or_infer(
    schema_path: Option<&std::path::Path>,
    source: &dyn LineSource,
    config: &InferenceConfig,
) -> Result<Schema> {
    match schema_path {
        Some(path) => {
            let schema = Schema::load(path)?;
            debug!("Loaded schema {path:?}: {}", schema.layout.describe());
            Ok(schema)
        }
        None => infer_schema(source, config)
            .with_context(|| format!("Inferring schema from {}", source.describe())),
    }
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let config = build_config(&args.options)?;
    let source = open_source(&args.input, &args.options)?;
    let schema = infer_schema(source.as_ref(), &config)
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;

    println!("Layout: {}", schema.layout.describe());
    println!("Header: {}", if schema.has_header { "yes" } else { "no" });
    let mut table = TextTable::new()
        .column("#", Alignment::Right)
        .column("name", Alignment::Left)
        .column("datatype", Alignment::Left)
        .column("width", Alignment::Right)
        .column("mask", Alignment::Left);
    for column in &schema.columns {
        table.push_row([
            (column.index + 1).to_string(),
            column.name.clone(),
            column.datatype.to_string(),
            column.max_width.to_string(),
            column.mask.clone(),
        ]);
    }
    print!("{table}");

    if let Some(output) = &args.output {
        schema
            .save(output)
            .with_context(|| format!("Writing schema to {output:?}"))?;
        info!(
            "Inferred schema for {} column(s) written to {:?}",
            schema.columns.len(),
            output
        );
    } else {
        info!("Inferred schema for {} column(s)", schema.columns.len());
    }
    Ok(())
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let config = build_config(&args.options)?;
    let source = open_source(&args.input, &args.options)?;
    let schema = load_or_infer(args.schema.as_deref(), source.as_ref(), &config)?;
    let analysis = report::analyze(source.as_ref(), &schema, &config)
        .with_context(|| format!("Analyzing {:?}", args.input))?;
    let context = ReportContext {
        source: source.describe(),
        generated: Local::now().naive_local(),
    };
    io_utils::write_text(args.output.as_deref(), &analysis.render(&context))?;
    info!(
        "Analyzed {} record(s) across {} column(s)",
        analysis.records,
        analysis.columns.len()
    );
    Ok(())
}

/// Resolve column selectors by exact name first, then as 1-based positions.
pub fn resolve_columns(schema: &Schema, selectors: &[String]) -> Result<Vec<usize>> {
    selectors
        .iter()
        .map(|selector| selector.trim())
        .filter(|selector| !selector.is_empty())
        .map(|selector| {
            if let Some(index) = schema.column_index(selector) {
                return Ok(index);
            }
            match selector.parse::<usize>() {
                Ok(0) => bail!("Column positions start at 1"),
                Ok(position) => Ok(position - 1),
                Err(_) => Err(anyhow!("Column '{selector}' not found in schema")),
            }
        })
        .collect()
}

fn handle_unique(args: &cli::UniqueArgs) -> Result<()> {
    let config = build_config(&args.options)?;
    let source = open_source(&args.input, &args.options)?;
    let schema = load_or_infer(args.schema.as_deref(), source.as_ref(), &config)?;
    let columns = resolve_columns(&schema, &args.columns)?;
    debug!("Unique columns: {columns:?}");
    let sort = args.sort.map(|sort| UniqueSort {
        key: match sort {
            SortBy::Value => SortKey::Value,
            SortBy::Count => SortKey::Count,
        },
        descending: args.desc,
    });
    let report = unique::count_unique(source.as_ref(), &schema, &columns, sort, &config)
        .with_context(|| format!("Counting unique values in {:?}", args.input))?;
    let (delimiter, quote) = report.csv_bytes()?;
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter, Some(quote))?;
    report
        .write(&mut writer)
        .with_context(|| format!("Writing unique counts for {:?}", args.input))?;

    if let Some(path) = &args.output_schema {
        report
            .schema
            .save(path)
            .with_context(|| format!("Writing unique-count schema to {path:?}"))?;
    }
    info!(
        "Counted {} unique combination(s); output columns: {}",
        report.rows.len(),
        report
            .schema
            .columns
            .iter()
            .map(|c| format!("{} ({}, width {})", c.name, c.datatype, c.max_width))
            .join(", ")
    );
    Ok(())
}
