//! Value classification.
//!
//! Every field value falls into exactly one [`ValueKind`]. Integers are signed
//! digit runs and decimals carry exactly one `.` or `,`. Dates are three
//! numeric groups joined by one of `- / .` with an optional time of day.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail, ensure};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::{
    config::{InferenceConfig, expand_two_digit_year},
    schema::{ColumnMeta, ColumnType},
};

pub const DATE_SEPARATORS: [char; 3] = ['-', '/', '.'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecimalSeparator {
    Point,
    Comma,
}

impl DecimalSeparator {
    pub fn as_char(self) -> char {
        match self {
            DecimalSeparator::Point => '.',
            DecimalSeparator::Comma => ',',
        }
    }

    pub fn from_mask(mask: &str) -> Option<Self> {
        match mask {
            "." => Some(DecimalSeparator::Point),
            "," => Some(DecimalSeparator::Comma),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOrder {
    Ymd,
    Dmy,
    Mdy,
}

impl DateOrder {
    pub const ALL: [DateOrder; 3] = [DateOrder::Ymd, DateOrder::Dmy, DateOrder::Mdy];

    pub fn label(self) -> &'static str {
        match self {
            DateOrder::Ymd => "year-month-day",
            DateOrder::Dmy => "day-month-year",
            DateOrder::Mdy => "month-day-year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeFormat {
    HourMinute,
    HourMinuteSecond,
    Fractional,
}

impl TimeFormat {
    fn pattern(self) -> &'static str {
        match self {
            TimeFormat::HourMinute => "HH:mm",
            TimeFormat::HourMinuteSecond => "HH:mm:ss",
            TimeFormat::Fractional => "HH:mm:ss.fff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub separator: char,
    pub format: TimeFormat,
    pub time: NaiveTime,
}

/// A value that parsed as a calendar date under at least one field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateObservation {
    pub separator: char,
    pub groups: [u32; 3],
    pub year: i32,
    pub year_digits: usize,
    pub year_first: bool,
    pub time: Option<TimeOfDay>,
}

impl DateObservation {
    pub fn date(&self, order: DateOrder) -> Option<NaiveDate> {
        let [a, b, c] = self.groups;
        match (order, self.year_first) {
            (DateOrder::Ymd, true) => NaiveDate::from_ymd_opt(self.year, b, c),
            (DateOrder::Dmy, false) => NaiveDate::from_ymd_opt(self.year, b, a),
            (DateOrder::Mdy, false) => NaiveDate::from_ymd_opt(self.year, a, b),
            _ => None,
        }
    }

    pub fn datetime(&self, order: DateOrder) -> Option<NaiveDateTime> {
        let date = self.date(order)?;
        let time = self.time.map_or(NaiveTime::MIN, |tod| tod.time);
        Some(date.and_time(time))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Empty,
    /// `None` when the digits exceed what `i128` holds.
    Integer(Option<i128>),
    Decimal {
        value: Option<Decimal>,
        separator: DecimalSeparator,
    },
    DateTime(DateObservation),
    String,
}

pub fn classify(value: &str, config: &InferenceConfig) -> ValueKind {
    classify_at(value, config, config.two_digit_year_max.resolve())
}

/// [`classify`] with the two-digit year pivot already resolved.
pub fn classify_at(value: &str, config: &InferenceConfig, pivot: i32) -> ValueKind {
    let value = value.trim();
    if value.is_empty() {
        return ValueKind::Empty;
    }
    if let Some(integer) = parse_integer(value, config) {
        return ValueKind::Integer(integer);
    }
    if let Some((value, separator)) = parse_decimal(value, config) {
        return ValueKind::Decimal { value, separator };
    }
    if let Some(observation) = parse_date(value, config, pivot) {
        return ValueKind::DateTime(observation);
    }
    ValueKind::String
}

fn split_sign(value: &str) -> &str {
    value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value)
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn parse_integer(value: &str, config: &InferenceConfig) -> Option<Option<i128>> {
    let digits = split_sign(value);
    if !all_digits(digits) || digits.len() > config.integer_digits_max {
        return None;
    }
    Some(value.trim_start_matches('+').parse().ok())
}

fn parse_decimal(value: &str, config: &InferenceConfig) -> Option<(Option<Decimal>, DecimalSeparator)> {
    let body = split_sign(value);
    let mut separators = body.match_indices(['.', ',']);
    let (pos, sep) = separators.next()?;
    if separators.next().is_some() {
        return None;
    }
    let separator = if sep == "." {
        DecimalSeparator::Point
    } else {
        DecimalSeparator::Comma
    };
    let (whole, fraction) = (&body[..pos], &body[pos + 1..]);
    if !all_digits(fraction) {
        return None;
    }
    if whole.is_empty() {
        if config.decimal_leading_zero {
            return None;
        }
    } else if !all_digits(whole) {
        return None;
    }
    if whole.len() + fraction.len() > config.decimal_digits_max
        || fraction.len() > config.decimal_places_max
    {
        return None;
    }
    let normalized = value.replace(',', ".");
    let normalized = normalized.trim_start_matches('+');
    let parsed = if whole.is_empty() {
        let sign = if value.starts_with('-') { "-" } else { "" };
        Decimal::from_str(&format!("{sign}0.{fraction}")).ok()
    } else {
        Decimal::from_str(normalized).ok()
    };
    Some((parsed, separator))
}

fn parse_time(value: &str) -> Option<(TimeFormat, NaiveTime)> {
    let format = match (value.matches(':').count(), value.contains('.')) {
        (1, false) => TimeFormat::HourMinute,
        (2, false) => TimeFormat::HourMinuteSecond,
        (2, true) => TimeFormat::Fractional,
        _ => return None,
    };
    let pattern = match format {
        TimeFormat::HourMinute => "%H:%M",
        _ => "%H:%M:%S%.f",
    };
    NaiveTime::parse_from_str(value, pattern)
        .ok()
        .map(|time| (format, time))
}

fn parse_date(value: &str, config: &InferenceConfig, pivot: i32) -> Option<DateObservation> {
    let (date_part, time) = match value.find([' ', 'T']) {
        Some(pos) => {
            let separator = value[pos..].chars().next()?;
            let (format, time) = parse_time(value[pos + 1..].trim_start())?;
            (
                &value[..pos],
                Some(TimeOfDay {
                    separator,
                    format,
                    time,
                }),
            )
        }
        None => (value, None),
    };

    let separator = date_part.chars().find(|ch| DATE_SEPARATORS.contains(ch))?;
    let parts = date_part.split(separator).collect::<Vec<_>>();
    if parts.len() != 3 || parts.iter().any(|part| !all_digits(part) || part.len() > 4) {
        return None;
    }

    let year_first = parts[0].len() == 4;
    let (year_part, others) = if year_first {
        (parts[0], [parts[1], parts[2]])
    } else {
        (parts[2], [parts[0], parts[1]])
    };
    if !matches!(year_part.len(), 2 | 4) || others.iter().any(|part| part.len() > 2) {
        return None;
    }
    let raw_year = year_part.parse::<u32>().ok()?;
    let year = if year_part.len() == 2 {
        expand_two_digit_year(pivot, raw_year)
    } else {
        raw_year as i32
    };
    if !config.year_in_range(year) {
        return None;
    }

    let groups = [
        parts[0].parse().ok()?,
        parts[1].parse().ok()?,
        parts[2].parse().ok()?,
    ];
    let observation = DateObservation {
        separator,
        groups,
        year,
        year_digits: year_part.len(),
        year_first,
        time,
    };
    DateOrder::ALL
        .iter()
        .any(|order| observation.date(*order).is_some())
        .then_some(observation)
}

/// Date pattern such as `yyyy-MM-dd` or `dd/MM/yyyy HH:mm:ss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMask {
    pub order: DateOrder,
    pub separator: char,
    pub year_digits: usize,
    pub time: Option<(char, TimeFormat)>,
}

impl DateMask {
    /// Parse `value` under this mask.
    pub fn parse(&self, value: &str, config: &InferenceConfig) -> Option<NaiveDateTime> {
        let pivot = config.two_digit_year_max.resolve();
        let observation = parse_date(value.trim(), config, pivot)?;
        if observation.separator != self.separator
            || observation.year_digits != self.year_digits
            || observation.time.is_some() != self.time.is_some()
        {
            return None;
        }
        observation.datetime(self.order)
    }
}

impl fmt::Display for DateMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year = if self.year_digits == 2 { "yy" } else { "yyyy" };
        let tokens = match self.order {
            DateOrder::Ymd => [year, "MM", "dd"],
            DateOrder::Dmy => ["dd", "MM", year],
            DateOrder::Mdy => ["MM", "dd", year],
        };
        let sep = self.separator;
        write!(f, "{}{sep}{}{sep}{}", tokens[0], tokens[1], tokens[2])?;
        if let Some((time_sep, format)) = self.time {
            write!(f, "{time_sep}{}", format.pattern())?;
        }
        Ok(())
    }
}

impl FromStr for DateMask {
    type Err = anyhow::Error;

    fn from_str(mask: &str) -> Result<Self> {
        let (date_part, time) = match mask.find([' ', 'T']) {
            Some(pos) => {
                let time_sep = mask[pos..]
                    .chars()
                    .next()
                    .ok_or_else(|| anyhow!("Malformed date mask '{mask}'"))?;
                let format = match &mask[pos + 1..] {
                    "HH:mm" => TimeFormat::HourMinute,
                    "HH:mm:ss" => TimeFormat::HourMinuteSecond,
                    other if other.starts_with("HH:mm:ss.") => TimeFormat::Fractional,
                    other => bail!("Unsupported time pattern '{other}' in mask '{mask}'"),
                };
                (&mask[..pos], Some((time_sep, format)))
            }
            None => (mask, None),
        };
        let separator = date_part
            .chars()
            .find(|ch| !matches!(ch, 'y' | 'M' | 'd'))
            .ok_or_else(|| anyhow!("Date mask '{mask}' has no separator"))?;
        let tokens = date_part.split(separator).collect::<Vec<_>>();
        ensure!(tokens.len() == 3, "Date mask '{mask}' needs three parts");
        let leads = tokens
            .iter()
            .map(|token| token.chars().next().unwrap_or(' '))
            .collect::<Vec<_>>();
        let order = match leads.as_slice() {
            ['y', 'M', 'd'] => DateOrder::Ymd,
            ['d', 'M', 'y'] => DateOrder::Dmy,
            ['M', 'd', 'y'] => DateOrder::Mdy,
            _ => bail!("Unsupported field order in date mask '{mask}'"),
        };
        let year_digits = tokens
            .iter()
            .find(|token| token.starts_with('y'))
            .map_or(4, |token| token.len());
        ensure!(
            matches!(year_digits, 2 | 4),
            "Year in date mask '{mask}' must be yy or yyyy"
        );
        Ok(DateMask {
            order,
            separator,
            year_digits,
            time,
        })
    }
}

/// True when `value` is acceptable for `column`'s datatype and mask.
pub fn conforms(column: &ColumnMeta, value: &str, config: &InferenceConfig) -> bool {
    let kind = classify(value, config);
    if kind == ValueKind::Empty {
        return true;
    }
    match column.datatype {
        ColumnType::String => true,
        ColumnType::Integer => matches!(kind, ValueKind::Integer(_)),
        ColumnType::Decimal => match kind {
            ValueKind::Integer(_) => true,
            ValueKind::Decimal { separator, .. } => DecimalSeparator::from_mask(&column.mask)
                .is_none_or(|expected| expected == separator),
            _ => false,
        },
        ColumnType::DateTime => match column.mask.parse::<DateMask>() {
            Ok(mask) => mask.parse(value, config).is_some(),
            Err(_) => matches!(kind, ValueKind::DateTime(_)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YearPivot;

    fn config() -> InferenceConfig {
        InferenceConfig {
            two_digit_year_max: YearPivot::Year(2030),
            ..InferenceConfig::default()
        }
    }

    #[test]
    fn classifies_integers() {
        let config = config();
        assert_eq!(classify("42", &config), ValueKind::Integer(Some(42)));
        assert_eq!(classify("-7", &config), ValueKind::Integer(Some(-7)));
        assert_eq!(classify("+3", &config), ValueKind::Integer(Some(3)));
        assert_eq!(classify("1234567890123", &config), ValueKind::String);
        assert_eq!(classify("  ", &config), ValueKind::Empty);
    }

    #[test]
    fn integers_past_i128_keep_their_class() {
        let config = InferenceConfig {
            integer_digits_max: 45,
            ..config()
        };
        let forty_digits = "9".repeat(40);
        assert_eq!(classify(&forty_digits, &config), ValueKind::Integer(None));
        assert_eq!(
            classify(&format!("-{forty_digits}"), &config),
            ValueKind::Integer(None)
        );
        assert_eq!(classify(&"9".repeat(46), &config), ValueKind::String);
    }

    #[test]
    fn two_digit_years_expand_against_the_given_pivot() {
        let config = config();
        let year = |pivot| match classify_at("05/06/07", &config, pivot) {
            ValueKind::DateTime(observation) => Some(observation.year),
            _ => None,
        };
        assert_eq!(year(2010), Some(2007));
        assert_eq!(year(2005), Some(1907));
    }

    #[test]
    fn classifies_decimals_with_either_separator() {
        let config = config();
        assert_eq!(
            classify("3.25", &config),
            ValueKind::Decimal {
                value: Some(Decimal::new(325, 2)),
                separator: DecimalSeparator::Point
            }
        );
        assert_eq!(
            classify("-3,5", &config),
            ValueKind::Decimal {
                value: Some(Decimal::new(-35, 1)),
                separator: DecimalSeparator::Comma
            }
        );
        assert_eq!(classify("1.2.3", &config), ValueKind::String);
        assert_eq!(classify("1.", &config), ValueKind::String);
    }

    #[test]
    fn leading_zero_setting_controls_bare_fractions() {
        let strict = config();
        assert_eq!(classify(".5", &strict), ValueKind::String);
        let relaxed = InferenceConfig {
            decimal_leading_zero: false,
            ..config()
        };
        assert_eq!(
            classify("-.5", &relaxed),
            ValueKind::Decimal {
                value: Some(Decimal::new(-5, 1)),
                separator: DecimalSeparator::Point
            }
        );
    }

    #[test]
    fn decimal_places_limit_applies() {
        let config = InferenceConfig {
            decimal_places_max: 2,
            ..config()
        };
        assert!(matches!(classify("1.25", &config), ValueKind::Decimal { .. }));
        assert_eq!(classify("1.255", &config), ValueKind::String);
    }

    #[test]
    fn classifies_dates_and_times() {
        let config = config();
        let ValueKind::DateTime(obs) = classify("2021-03-04", &config) else {
            panic!("expected date");
        };
        assert!(obs.year_first);
        assert_eq!(
            obs.date(DateOrder::Ymd),
            NaiveDate::from_ymd_opt(2021, 3, 4)
        );

        let ValueKind::DateTime(obs) = classify("31/12/99 23:59:58", &config) else {
            panic!("expected datetime");
        };
        assert_eq!(obs.year, 1999);
        assert_eq!(obs.date(DateOrder::Mdy), None);
        assert_eq!(obs.time.map(|t| t.format), Some(TimeFormat::HourMinuteSecond));
    }

    #[test]
    fn rejects_impossible_dates_and_out_of_range_years() {
        let config = config();
        assert_eq!(classify("2021-02-30", &config), ValueKind::String);
        assert_eq!(classify("1850-01-01", &config), ValueKind::String);
        assert_eq!(classify("2021-01/01", &config), ValueKind::String);
    }

    #[test]
    fn date_mask_round_trips_through_text() {
        for text in ["yyyy-MM-dd", "dd/MM/yyyy HH:mm:ss", "MM.dd.yy", "yyyy-MM-ddTHH:mm"] {
            let mask: DateMask = text.parse().expect("parse mask");
            assert_eq!(mask.to_string(), text);
        }
        assert!("yyyy-dd".parse::<DateMask>().is_err());
    }

    #[test]
    fn date_mask_parses_matching_values_only() {
        let config = config();
        let mask: DateMask = "dd/MM/yyyy".parse().expect("mask");
        assert!(mask.parse("13/01/2020", &config).is_some());
        assert!(mask.parse("2020-01-13", &config).is_none());
        assert!(mask.parse("13/01/2020 10:00", &config).is_none());
    }

    #[test]
    fn conforms_checks_type_and_mask() {
        let config = config();
        let column = |datatype, mask: &str| ColumnMeta {
            name: "c".to_string(),
            index: 0,
            datatype,
            max_width: 10,
            mask: mask.to_string(),
        };
        assert!(!conforms(&column(ColumnType::Integer, ""), "Age", &config));
        assert!(conforms(&column(ColumnType::Integer, ""), "30", &config));
        assert!(conforms(&column(ColumnType::Decimal, "."), "12", &config));
        assert!(!conforms(&column(ColumnType::Decimal, "."), "1,5", &config));
        assert!(!conforms(&column(ColumnType::DateTime, "yyyy-MM-dd"), "Date", &config));
        assert!(conforms(&column(ColumnType::String, ""), "anything", &config));
    }
}
