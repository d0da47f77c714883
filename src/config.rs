//! Inference configuration.
//!
//! [`InferenceConfig`] is an immutable value handed to every detector and
//! accumulator for the duration of one call. It deserializes from YAML with
//! per-field defaults, so a config file only needs to mention what it changes.

use std::{fmt, path::Path, str::FromStr, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::yaml_provider;

pub const DEFAULT_SEPARATORS: &str = ",;\\t|";
pub const DEFAULT_QUOTE_CHAR: char = '"';
pub const SYS_YEAR: &str = "SysYear";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid escape '{0}' in separator list")]
    InvalidSeparatorEscape(String),
    #[error("Preferred separator list is empty")]
    EmptySeparatorSet,
    #[error("A manual separator and manual field widths cannot both be set")]
    ConflictingLayoutOverrides,
    #[error("Manual field widths must be non-empty and positive")]
    InvalidFieldWidths,
    #[error("year_min ({min}) cannot exceed year_max ({max})")]
    InvalidYearRange { min: i32, max: i32 },
    #[error("Two-digit year pivot '{0}' must be a year or '{SYS_YEAR}'")]
    InvalidYearPivot(String),
    #[error("Error tolerance must be between 0 and 100 percent, got {0}")]
    ToleranceOutOfRange(u32),
    #[error("Separator {0:?} is not an ASCII character")]
    NonAsciiSeparator(char),
    #[error("Quote character {0:?} is not an ASCII character")]
    NonAsciiQuote(char),
}

/// Ordered set of characters preferred as column separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeparatorSet(Vec<char>);

impl SeparatorSet {
    pub fn chars(&self) -> &[char] {
        &self.0
    }

    pub fn contains(&self, ch: char) -> bool {
        self.0.contains(&ch)
    }

    /// Position of `ch` in the preference order.
    pub fn rank(&self, ch: char) -> Option<usize> {
        self.0.iter().position(|candidate| *candidate == ch)
    }
}

impl Default for SeparatorSet {
    fn default() -> Self {
        SeparatorSet(vec![',', ';', '\t', '|'])
    }
}

fn separator_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"(\\u[0-9a-fA-F]{4}|\\x[0-9a-fA-F]{2}|\\.|.)").expect("valid separator regex")
    })
}

impl FromStr for SeparatorSet {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Ok(SeparatorSet::default());
        }
        let mut chars = Vec::new();
        for token in separator_token_regex().find_iter(value) {
            let token = token.as_str();
            let ch = if token.len() > 1 && token.starts_with('\\') {
                parse_escape(token)?
            } else {
                token.chars().next().unwrap_or('\0')
            };
            if ch != '\0' && !chars.contains(&ch) {
                chars.push(ch);
            }
        }
        if chars.is_empty() {
            return Err(ConfigError::EmptySeparatorSet);
        }
        Ok(SeparatorSet(chars))
    }
}

fn parse_escape(token: &str) -> Result<char, ConfigError> {
    let body = &token[1..];
    let invalid = || ConfigError::InvalidSeparatorEscape(token.to_string());
    match body {
        "t" => Ok('\t'),
        "r" => Ok('\r'),
        "n" => Ok('\n'),
        "a" => Ok('\u{7}'),
        "e" => Ok('\u{1b}'),
        "\\" => Ok('\\'),
        hex if hex.starts_with('u') || hex.starts_with('x') => u32::from_str_radix(&hex[1..], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

impl TryFrom<String> for SeparatorSet {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeparatorSet> for String {
    fn from(value: SeparatorSet) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SeparatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in &self.0 {
            match ch {
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\n' => f.write_str("\\n")?,
                '\\' => f.write_str("\\\\")?,
                c if (*c as u32) < 32 => write!(f, "\\u{:04x}", *c as u32)?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

/// Upper bound for expanding two-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "YearPivotRepr", into = "YearPivotRepr")]
pub enum YearPivot {
    #[default]
    SysYear,
    Year(i32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum YearPivotRepr {
    Year(i32),
    Label(String),
}

impl YearPivot {
    pub fn resolve(&self) -> i32 {
        match self {
            YearPivot::SysYear => Local::now().year(),
            YearPivot::Year(year) => *year,
        }
    }
}

/// Expand a two-digit year so it lands in `(pivot - 100, pivot]`.
pub fn expand_two_digit_year(pivot: i32, two_digit: u32) -> i32 {
    let year = pivot - pivot.rem_euclid(100) + two_digit as i32;
    if year > pivot { year - 100 } else { year }
}

impl FromStr for YearPivot {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(SYS_YEAR) {
            return Ok(YearPivot::SysYear);
        }
        match trimmed.parse::<i32>() {
            Ok(0) => Ok(YearPivot::SysYear),
            Ok(year) => Ok(YearPivot::Year(year)),
            Err(_) => Err(ConfigError::InvalidYearPivot(value.to_string())),
        }
    }
}

impl TryFrom<YearPivotRepr> for YearPivot {
    type Error = ConfigError;

    fn try_from(value: YearPivotRepr) -> Result<Self, Self::Error> {
        match value {
            YearPivotRepr::Year(0) => Ok(YearPivot::SysYear),
            YearPivotRepr::Year(year) => Ok(YearPivot::Year(year)),
            YearPivotRepr::Label(label) => label.parse(),
        }
    }
}

impl From<YearPivot> for YearPivotRepr {
    fn from(value: YearPivot) -> Self {
        match value {
            YearPivot::SysYear => YearPivotRepr::Label(SYS_YEAR.to_string()),
            YearPivot::Year(year) => YearPivotRepr::Year(year),
        }
    }
}

/// Manual settings that bypass detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_widths: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub separators: SeparatorSet,
    pub quote_char: char,
    pub unique_values_max: usize,
    pub integer_digits_max: usize,
    pub decimal_digits_max: usize,
    pub decimal_places_max: usize,
    pub decimal_leading_zero: bool,
    pub year_min: i32,
    pub year_max: i32,
    pub two_digit_year_max: YearPivot,
    /// Percentage of non-matching values a column may hold and keep its type.
    pub error_tolerance: u32,
    pub trim_values: bool,
    pub overrides: ManualOverrides,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            separators: SeparatorSet::default(),
            quote_char: DEFAULT_QUOTE_CHAR,
            unique_values_max: 15,
            integer_digits_max: 12,
            decimal_digits_max: 20,
            decimal_places_max: 20,
            decimal_leading_zero: true,
            year_min: 1900,
            year_max: 2050,
            two_digit_year_max: YearPivot::SysYear,
            error_tolerance: 1,
            trim_values: true,
            overrides: ManualOverrides::default(),
        }
    }
}

impl InferenceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: InferenceConfig = yaml_provider::load_from_path(path)
            .with_context(|| format!("Loading inference config {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating inference config {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.separators.chars().is_empty() {
            return Err(ConfigError::EmptySeparatorSet);
        }
        if let Some(separator) = self
            .separators
            .chars()
            .iter()
            .chain(&self.overrides.separator)
            .find(|ch| !ch.is_ascii())
        {
            return Err(ConfigError::NonAsciiSeparator(*separator));
        }
        if !self.quote_char.is_ascii() {
            return Err(ConfigError::NonAsciiQuote(self.quote_char));
        }
        if self.overrides.separator.is_some() && self.overrides.field_widths.is_some() {
            return Err(ConfigError::ConflictingLayoutOverrides);
        }
        if let Some(widths) = &self.overrides.field_widths
            && (widths.is_empty() || widths.contains(&0))
        {
            return Err(ConfigError::InvalidFieldWidths);
        }
        if self.year_min > self.year_max {
            return Err(ConfigError::InvalidYearRange {
                min: self.year_min,
                max: self.year_max,
            });
        }
        if self.error_tolerance > 100 {
            return Err(ConfigError::ToleranceOutOfRange(self.error_tolerance));
        }
        Ok(())
    }

    pub fn quote(&self) -> Option<char> {
        (self.quote_char != '\0').then_some(self.quote_char)
    }

    /// True when `failures` out of `total` stay within the error tolerance.
    pub fn within_tolerance(&self, failures: usize, total: usize) -> bool {
        failures.saturating_mul(100) <= total.saturating_mul(self.error_tolerance as usize)
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        (self.year_min..=self.year_max).contains(&year)
    }
}
