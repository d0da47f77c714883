//! Column statistics accumulation and datatype decisions.
//!
//! A [`ColumnStatistics`] is fed every value of one column through
//! [`ColumnStatistics::ingest`] and turned into a [`ColumnMeta`] by
//! [`ColumnStatistics::finalize`]. Finalizing is cached; ingesting more values
//! afterwards invalidates the cached result.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::{
    config::InferenceConfig,
    data::{self, DateMask, DateObservation, DateOrder, DecimalSeparator, TimeFormat, ValueKind},
    schema::{ColumnMeta, ColumnType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

fn widen<T: PartialOrd + Copy>(range: &mut Option<ValueRange<T>>, value: T) {
    match range {
        Some(existing) => {
            if value < existing.min {
                existing.min = value;
            }
            if value > existing.max {
                existing.max = value;
            }
        }
        None => {
            *range = Some(ValueRange {
                min: value,
                max: value,
            })
        }
    }
}

/// Tally of values per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub string: usize,
    pub integer: usize,
    pub decimal_point: usize,
    pub decimal_comma: usize,
    pub datetime: usize,
    pub empty: usize,
}

impl ClassCounts {
    pub fn decimal(&self) -> usize {
        self.decimal_point + self.decimal_comma
    }

    pub fn total(&self) -> usize {
        self.string + self.integer + self.decimal() + self.datetime + self.empty
    }

    pub fn non_empty(&self) -> usize {
        self.total() - self.empty
    }
}

#[derive(Debug, Clone, Default)]
struct DateTracker {
    separator: Option<char>,
    group_max: [u32; 3],
    year_first: usize,
    year_digits: Option<usize>,
    time: Option<(char, TimeFormat)>,
    ranges: [Option<ValueRange<NaiveDateTime>>; 3],
}

fn order_slot(order: DateOrder) -> usize {
    match order {
        DateOrder::Ymd => 0,
        DateOrder::Dmy => 1,
        DateOrder::Mdy => 2,
    }
}

impl DateTracker {
    /// Returns false when the value uses a different separator than the column.
    fn observe(&mut self, observation: &DateObservation) -> bool {
        match self.separator {
            Some(separator) if separator != observation.separator => return false,
            Some(_) => {}
            None => self.separator = Some(observation.separator),
        }
        for (max, group) in self.group_max.iter_mut().zip(observation.groups) {
            *max = (*max).max(group);
        }
        if observation.year_first {
            self.year_first += 1;
        }
        self.year_digits.get_or_insert(observation.year_digits);
        if let Some(tod) = observation.time {
            match self.time {
                Some((_, format)) if format >= tod.format => {}
                _ => self.time = Some((tod.separator, tod.format)),
            }
        }
        for order in DateOrder::ALL {
            if let Some(value) = observation.datetime(order) {
                widen(&mut self.ranges[order_slot(order)], value);
            }
        }
        true
    }

    fn order(&self, total: usize) -> DateOrder {
        if self.year_first * 2 > total {
            DateOrder::Ymd
        } else if self.group_max[0] > 12 {
            DateOrder::Dmy
        } else if self.group_max[1] > 12 {
            DateOrder::Mdy
        } else {
            DateOrder::Dmy
        }
    }

    fn mask(&self, total: usize) -> Option<DateMask> {
        Some(DateMask {
            order: self.order(total),
            separator: self.separator?,
            year_digits: self.year_digits.unwrap_or(4),
            time: self.time,
        })
    }
}

/// Distinct values and their counts, abandoned once the cap is exceeded.
#[derive(Debug, Clone)]
pub struct UniqueTally {
    cap: usize,
    values: BTreeMap<String, usize>,
    overflowed: bool,
}

impl UniqueTally {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            values: BTreeMap::new(),
            overflowed: false,
        }
    }

    pub fn record(&mut self, value: &str) {
        if self.overflowed {
            return;
        }
        *self.values.entry(value.to_string()).or_insert(0) += 1;
        if self.values.len() > self.cap {
            self.values.clear();
            self.overflowed = true;
        }
    }

    /// Values sorted ascending, or `None` after overflow.
    pub fn values(&self) -> Option<&BTreeMap<String, usize>> {
        (!self.overflowed).then_some(&self.values)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnStatistics<'cfg> {
    config: &'cfg InferenceConfig,
    pivot: i32,
    index: usize,
    first_value: Option<String>,
    counts: ClassCounts,
    widths: Option<ValueRange<usize>>,
    integers: Option<ValueRange<i128>>,
    decimals: Option<ValueRange<Decimal>>,
    dates: DateTracker,
    uniques: UniqueTally,
    finalized: Option<ColumnMeta>,
}

impl<'cfg> ColumnStatistics<'cfg> {
    pub fn new(index: usize, config: &'cfg InferenceConfig) -> Self {
        Self {
            config,
            pivot: config.two_digit_year_max.resolve(),
            index,
            first_value: None,
            counts: ClassCounts::default(),
            widths: None,
            integers: None,
            decimals: None,
            dates: DateTracker::default(),
            uniques: UniqueTally::new(config.unique_values_max),
            finalized: None,
        }
    }

    pub fn ingest(&mut self, value: &str) {
        self.finalized = None;
        if self.first_value.is_none() {
            self.first_value = Some(value.to_string());
        }
        self.uniques.record(value);

        match data::classify_at(value, self.config, self.pivot) {
            ValueKind::Empty => {
                self.counts.empty += 1;
                return;
            }
            ValueKind::Integer(number) => {
                self.counts.integer += 1;
                if let Some(number) = number {
                    widen(&mut self.integers, number);
                }
            }
            ValueKind::Decimal { value, separator } => {
                match separator {
                    DecimalSeparator::Point => self.counts.decimal_point += 1,
                    DecimalSeparator::Comma => self.counts.decimal_comma += 1,
                }
                if let Some(value) = value {
                    widen(&mut self.decimals, value);
                }
            }
            ValueKind::DateTime(observation) => {
                if self.dates.observe(&observation) {
                    self.counts.datetime += 1;
                } else {
                    self.counts.string += 1;
                }
            }
            ValueKind::String => self.counts.string += 1,
        }
        widen(&mut self.widths, value.chars().count());
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Year that two-digit years expand against, fixed when the column opens.
    pub fn pivot_year(&self) -> i32 {
        self.pivot
    }

    /// The row-1 value, used as the column name when a header is present.
    pub fn first_value(&self) -> Option<&str> {
        self.first_value.as_deref()
    }

    pub fn counts(&self) -> &ClassCounts {
        &self.counts
    }

    pub fn rows(&self) -> usize {
        self.counts.total()
    }

    pub fn width_range(&self) -> Option<ValueRange<usize>> {
        self.widths
    }

    pub fn integer_range(&self) -> Option<ValueRange<i128>> {
        self.integers
    }

    pub fn decimal_range(&self) -> Option<ValueRange<Decimal>> {
        self.decimals
    }

    /// Date range under the field order the column's mask resolves to.
    pub fn date_range(&self) -> Option<ValueRange<NaiveDateTime>> {
        let order = self.dates.order(self.counts.datetime);
        self.dates.ranges[order_slot(order)]
    }

    pub fn unique_values(&self) -> Option<&BTreeMap<String, usize>> {
        self.uniques.values()
    }

    fn decide(&self) -> ColumnType {
        let non_empty = self.counts.non_empty();
        if non_empty == 0 {
            return ColumnType::String;
        }
        let candidates = [
            (ColumnType::Integer, self.counts.integer),
            (ColumnType::Decimal, self.counts.integer + self.counts.decimal()),
            (ColumnType::DateTime, self.counts.datetime),
        ];
        let mut best: Option<(ColumnType, usize)> = None;
        for (datatype, tally) in candidates {
            if tally == 0 || !self.config.within_tolerance(non_empty - tally, non_empty) {
                continue;
            }
            if best.is_none_or(|(_, best_tally)| tally > best_tally) {
                best = Some((datatype, tally));
            }
        }
        best.map_or(ColumnType::String, |(datatype, _)| datatype)
    }

    fn mask_for(&self, datatype: ColumnType) -> String {
        match datatype {
            ColumnType::Decimal => {
                let separator = if self.counts.decimal_comma > self.counts.decimal_point {
                    DecimalSeparator::Comma
                } else {
                    DecimalSeparator::Point
                };
                separator.as_char().to_string()
            }
            ColumnType::DateTime => self
                .dates
                .mask(self.counts.datetime)
                .map(|mask| mask.to_string())
                .unwrap_or_default(),
            ColumnType::String | ColumnType::Integer => String::new(),
        }
    }

    pub fn finalize(&mut self) -> ColumnMeta {
        if let Some(meta) = &self.finalized {
            return meta.clone();
        }
        let datatype = self.decide();
        let meta = ColumnMeta {
            name: self.first_value.clone().unwrap_or_default(),
            index: self.index,
            datatype,
            max_width: self.widths.map_or(0, |range| range.max),
            mask: self.mask_for(datatype),
        };
        self.finalized = Some(meta.clone());
        meta
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local};

    use super::*;
    use crate::config::YearPivot;

    fn config() -> InferenceConfig {
        InferenceConfig {
            two_digit_year_max: YearPivot::Year(2030),
            ..InferenceConfig::default()
        }
    }

    fn finalize(values: &[&str], config: &InferenceConfig) -> ColumnMeta {
        let mut stats = ColumnStatistics::new(0, config);
        for value in values {
            stats.ingest(value);
        }
        stats.finalize()
    }

    #[test]
    fn integers_win_ties_with_decimal() {
        let meta = finalize(&["1", "22", "333"], &config());
        assert_eq!(meta.datatype, ColumnType::Integer);
        assert_eq!(meta.max_width, 3);
        assert_eq!(meta.name, "1");
    }

    #[test]
    fn mixed_numbers_become_decimal_with_majority_mask() {
        let meta = finalize(&["1", "2,5", "3,75", "4.5"], &config());
        assert_eq!(meta.datatype, ColumnType::Decimal);
        assert_eq!(meta.mask, ",");
    }

    #[test]
    fn tolerance_allows_one_percent_noise() {
        let mut values = vec!["n/a"];
        values.extend(std::iter::repeat_n("7", 100));
        assert_eq!(finalize(&values, &config()).datatype, ColumnType::Integer);

        let strict = InferenceConfig {
            error_tolerance: 0,
            ..config()
        };
        assert_eq!(finalize(&values, &strict).datatype, ColumnType::String);
    }

    #[test]
    fn empty_values_do_not_count_against_type() {
        let meta = finalize(&["", "5", " ", "6"], &config());
        assert_eq!(meta.datatype, ColumnType::Integer);
        assert_eq!(finalize(&["", ""], &config()).datatype, ColumnType::String);
    }

    #[test]
    fn date_mask_from_group_maxima() {
        let meta = finalize(&["01/02/2020", "25/03/2021"], &config());
        assert_eq!(meta.datatype, ColumnType::DateTime);
        assert_eq!(meta.mask, "dd/MM/yyyy");

        let meta = finalize(&["01/02/2020", "03/25/2021"], &config());
        assert_eq!(meta.mask, "MM/dd/yyyy");

        let meta = finalize(&["2020-01-02 10:00", "2021-03-04 11:30:15"], &config());
        assert_eq!(meta.mask, "yyyy-MM-dd HH:mm:ss");
    }

    #[test]
    fn second_date_separator_counts_as_string() {
        let config = config();
        let mut stats = ColumnStatistics::new(0, &config);
        stats.ingest("2020-01-02");
        stats.ingest("2020/01/03");
        assert_eq!(stats.counts().datetime, 1);
        assert_eq!(stats.counts().string, 1);
    }

    #[test]
    fn system_year_pivot_is_fixed_at_creation() {
        let config = InferenceConfig::default();
        let stats = ColumnStatistics::new(0, &config);
        assert_eq!(stats.pivot_year(), Local::now().year());
        assert_eq!(ColumnStatistics::new(1, &self::config()).pivot_year(), 2030);
    }

    #[test]
    fn oversized_integers_stay_integer_without_a_range() {
        let config = InferenceConfig {
            integer_digits_max: 45,
            ..config()
        };
        let long = "1".repeat(40);
        let meta = finalize(&[long.as_str(), "12", long.as_str()], &config);
        assert_eq!(meta.datatype, ColumnType::Integer);

        let mut stats = ColumnStatistics::new(0, &config);
        stats.ingest(&long);
        assert_eq!(stats.counts().integer, 1);
        assert_eq!(stats.integer_range(), None);
    }

    #[test]
    fn ranges_track_extremes() {
        let config = config();
        let mut stats = ColumnStatistics::new(0, &config);
        for value in ["5", "-3", "12", "1.5", "2020-01-02", "1999-12-31"] {
            stats.ingest(value);
        }
        assert_eq!(stats.integer_range(), Some(ValueRange { min: -3, max: 12 }));
        assert_eq!(
            stats.decimal_range(),
            Some(ValueRange {
                min: Decimal::new(15, 1),
                max: Decimal::new(15, 1)
            })
        );
        let dates = stats.date_range().expect("dates");
        assert_eq!(dates.min.to_string(), "1999-12-31 00:00:00");
        assert_eq!(stats.width_range(), Some(ValueRange { min: 1, max: 10 }));
    }

    #[test]
    fn unique_tally_abandons_past_cap() {
        let config = InferenceConfig {
            unique_values_max: 2,
            ..config()
        };
        let mut stats = ColumnStatistics::new(0, &config);
        stats.ingest("a");
        stats.ingest("b");
        stats.ingest("a");
        assert_eq!(stats.unique_values().map(|v| v["a"]), Some(2));
        stats.ingest("c");
        assert!(stats.unique_values().is_none());
    }

    #[test]
    fn finalize_is_cached_until_more_input() {
        let config = config();
        let mut stats = ColumnStatistics::new(3, &config);
        stats.ingest("x");
        let first = stats.finalize();
        assert_eq!(stats.finalize(), first);
        assert_eq!(first.index, 3);
        stats.ingest("longer");
        assert_eq!(stats.finalize().max_width, 6);
    }
}
