//! Schema model and YAML persistence.
//!
//! A [`Schema`] is the finished result of inference: the [`Layout`] of the
//! file, whether the first row holds column names, and one [`ColumnMeta`] per
//! column. The layout enum keeps separator-delimited and fixed-width
//! descriptions mutually exclusive.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{io_utils, yaml_provider};

pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Column width recorded for non-tabular content.
pub const NON_TABULAR_WIDTH: usize = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    String,
    Integer,
    Decimal,
    DateTime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Decimal => "Decimal",
            ColumnType::DateTime => "DateTime",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["String", "Integer", "Decimal", "DateTime"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "decimal" | "numeric" => Ok(ColumnType::Decimal),
            "datetime" | "date-time" | "date" => Ok(ColumnType::DateTime),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.as_str().to_string()
    }
}

/// What a non-tabular input appears to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "XML")]
    Xml,
    Binary,
    Textfile,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Xml => "XML",
            ContentKind::Binary => "Binary",
            ContentKind::Textfile => "Textfile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    Delimited {
        separator: char,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quote: Option<char>,
    },
    FixedWidth {
        widths: Vec<usize>,
    },
    NonTabular {
        #[serde(rename = "content")]
        kind: ContentKind,
    },
    Undetermined,
}

impl Layout {
    pub fn separator(&self) -> Option<char> {
        match self {
            Layout::Delimited { separator, .. } => Some(*separator),
            _ => None,
        }
    }

    pub fn quote(&self) -> Option<char> {
        match self {
            Layout::Delimited { quote, .. } => *quote,
            _ => None,
        }
    }

    pub fn field_widths(&self) -> Option<&[usize]> {
        match self {
            Layout::FixedWidth { widths } => Some(widths),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Layout::Delimited { separator, quote } => {
                let quote = quote.map_or_else(|| "none".to_string(), |q| q.to_string());
                format!(
                    "delimited by '{}' (quote {quote})",
                    io_utils::printable_delimiter(*separator)
                )
            }
            Layout::FixedWidth { widths } => format!(
                "fixed width {}",
                widths.iter().join(",")
            ),
            Layout::NonTabular { kind } => format!("non-tabular ({})", kind.label()),
            Layout::Undetermined => "undetermined".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub index: usize,
    pub datatype: ColumnType,
    pub max_width: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mask: String,
}

impl ColumnMeta {
    pub fn new(index: usize, name: impl Into<String>, datatype: ColumnType, max_width: usize) -> Self {
        Self {
            name: name.into(),
            index,
            datatype,
            max_width,
            mask: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub layout: Layout,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl Schema {
    pub fn new(layout: Layout, has_header: bool, columns: Vec<ColumnMeta>) -> Self {
        Self {
            layout,
            has_header,
            columns,
            schema_version: None,
        }
    }

    /// Single String column named after the content kind.
    pub fn non_tabular(kind: ContentKind) -> Self {
        Self::new(
            Layout::NonTabular { kind },
            false,
            vec![ColumnMeta::new(
                0,
                kind.label(),
                ColumnType::String,
                NON_TABULAR_WIDTH,
            )],
        )
    }

    pub fn undetermined() -> Self {
        Self::new(Layout::Undetermined, false, Vec::new())
    }

    pub fn separator(&self) -> Option<char> {
        self.layout.separator()
    }

    pub fn quote(&self) -> Option<char> {
        self.layout.quote()
    }

    pub fn field_widths(&self) -> Option<&[usize]> {
        self.layout.field_widths()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        for (position, column) in self.columns.iter().enumerate() {
            ensure!(
                column.index == position,
                "Column '{}' has index {} but appears at position {position}",
                column.name,
                column.index
            );
        }
        match &self.layout {
            Layout::FixedWidth { widths } => ensure!(
                !widths.is_empty() && !widths.contains(&0),
                "Fixed-width layout needs positive widths"
            ),
            Layout::Delimited { separator, quote } => {
                io_utils::ascii_byte(*separator, "Separator")?;
                if let Some(quote) = quote {
                    io_utils::ascii_byte(*quote, "Quote character")?;
                }
            }
            Layout::NonTabular { .. } | Layout::Undetermined => {}
        }
        Ok(())
    }

    /// Writes the schema as YAML, or as JSON when the path ends in `.json`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let schema = self.versioned();
        if is_json_path(path) {
            let file =
                File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
            return serde_json::to_writer_pretty(file, &schema)
                .with_context(|| format!("Writing schema JSON {path:?}"));
        }
        yaml_provider::save_to_path(path, &schema)
            .with_context(|| format!("Writing schema file {path:?}"))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        yaml_provider::to_string(&self.versioned()).context("Serializing schema to YAML string")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let schema: Schema = if is_json_path(path) {
            let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Parsing schema JSON {path:?}"))?
        } else {
            yaml_provider::load_from_path(path)
                .with_context(|| format!("Loading schema file {path:?}"))?
        };
        schema.validate()?;
        Ok(schema)
    }

    fn versioned(&self) -> Schema {
        let mut schema = self.clone();
        if schema.schema_version.is_none() {
            schema.schema_version = Some(CURRENT_SCHEMA_VERSION.to_string());
        }
        schema
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_schema() -> Schema {
        let mut date = ColumnMeta::new(2, "when", ColumnType::DateTime, 10);
        date.mask = "yyyy-MM-dd".to_string();
        Schema::new(
            Layout::Delimited {
                separator: '\t',
                quote: Some('"'),
            },
            true,
            vec![
                ColumnMeta::new(0, "id", ColumnType::Integer, 3),
                ColumnMeta::new(1, "name", ColumnType::String, 12),
                date,
            ],
        )
    }

    #[test]
    fn column_type_parses_aliases() {
        assert_eq!("int".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!(" DateTime ".parse::<ColumnType>().unwrap(), ColumnType::DateTime);
        let err = "blob".parse::<ColumnType>().unwrap_err();
        assert!(err.to_string().contains("Supported types"));
    }

    #[test]
    fn layout_accessors_are_exclusive() {
        let fixed = Layout::FixedWidth {
            widths: vec![3, 4],
        };
        assert_eq!(fixed.separator(), None);
        assert_eq!(fixed.field_widths(), Some(&[3, 4][..]));
        let schema = sample_schema();
        assert_eq!(schema.separator(), Some('\t'));
        assert_eq!(schema.quote(), Some('"'));
        assert_eq!(schema.field_widths(), None);
    }

    #[test]
    fn non_tabular_schema_has_single_wide_column() {
        let schema = Schema::non_tabular(ContentKind::Xml);
        assert_eq!(schema.columns.len(), 1);
        assert_eq!(schema.columns[0].name, "XML");
        assert_eq!(schema.columns[0].max_width, NON_TABULAR_WIDTH);
        assert!(!schema.has_header);
    }

    #[test]
    fn schema_round_trips_through_yaml_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("schema.yml");
        let schema = sample_schema();
        schema.save(&path).expect("save schema");
        let loaded = Schema::load(&path).expect("load schema");
        assert_eq!(loaded.layout, schema.layout);
        assert_eq!(loaded.columns, schema.columns);
        assert_eq!(loaded.schema_version.as_deref(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn yaml_uses_layout_kind_tag() {
        let yaml = sample_schema().to_yaml_string().expect("yaml");
        assert!(yaml.contains("kind: delimited"));
        assert!(yaml.contains("datatype: DateTime"));
        assert!(yaml.contains("mask: yyyy-MM-dd"));
    }

    #[test]
    fn load_rejects_non_contiguous_indices() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.yml");
        let mut schema = sample_schema();
        schema.columns[1].index = 5;
        yaml_provider::save_to_path(&path, &schema).expect("write yaml");
        let err = Schema::load(&path).expect_err("bad indices");
        assert!(format!("{err:#}").contains("index 5"));
    }

    #[test]
    fn load_rejects_non_ascii_separator() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("wide.yml");
        let mut schema = sample_schema();
        schema.layout = Layout::Delimited {
            separator: '§',
            quote: Some('"'),
        };
        yaml_provider::save_to_path(&path, &schema).expect("write yaml");
        let err = Schema::load(&path).expect_err("wide separator");
        assert!(format!("{err:#}").contains("not an ASCII character"));
    }

    #[test]
    fn json_extension_selects_json_format() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("schema.json");
        let schema = sample_schema();
        schema.save(&path).expect("save json");
        let text = std::fs::read_to_string(&path).expect("read json");
        assert!(text.trim_start().starts_with('{'));
        assert!(text.contains("\"kind\": \"delimited\""));
        let loaded = Schema::load(&path).expect("load json");
        assert_eq!(loaded.columns, schema.columns);
        assert_eq!(loaded.schema_version.as_deref(), Some(CURRENT_SCHEMA_VERSION));
    }
}
