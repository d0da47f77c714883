mod common;

use common::TestWorkspace;
use csv_lint_infer::{
    config::{InferenceConfig, SeparatorSet},
    detect::{self, NO_SEPARATOR},
    fixed_width,
    frequency,
    schema::{ContentKind, Layout},
    source::{FileSource, MemorySource},
};
use encoding_rs::UTF_8;

#[test]
fn every_preferred_separator_is_found_with_certainty() {
    for separator in [',', ';', '\t', '|'] {
        let lines = (0..10)
            .map(|i| format!("a{i}{separator}b{i}{separator}c{i}"))
            .collect::<Vec<_>>();
        let source = MemorySource::from_lines("mem", &lines);
        let sample = frequency::sample(&source, Some('"')).expect("sample");
        let raw = detect::pick(&sample.raw, &SeparatorSet::default());
        assert_eq!(raw.separator, Some(separator));
        assert_eq!(raw.uncertainty, 0);
    }
}

#[test]
fn detection_is_idempotent() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_lines(
        "orders.txt",
        &["id|item|qty", "1|\"bolt|nut\"|4", "2|washer|10", "3|gear|1"],
    );
    let source = FileSource::new(&path, UTF_8);
    let config = InferenceConfig::default();
    let first = detect::detect_layout(&frequency::sample(&source, config.quote()).unwrap(), &config);
    let second = detect::detect_layout(&frequency::sample(&source, config.quote()).unwrap(), &config);
    assert_eq!(first, second);
    assert_eq!(
        first,
        Layout::Delimited {
            separator: '|',
            quote: Some('"')
        }
    );
}

#[test]
fn custom_preferred_set_limits_candidates() {
    let config = InferenceConfig {
        separators: "#".parse().expect("separator list"),
        ..InferenceConfig::default()
    };
    let source = MemorySource::from_lines("mem", &["a,b#c", "d,e#f"]);
    let sample = frequency::sample(&source, config.quote()).expect("sample");
    assert_eq!(
        detect::detect_layout(&sample, &config),
        Layout::Delimited {
            separator: '#',
            quote: Some('"')
        }
    );
}

#[test]
fn disabled_quote_char_uses_raw_table_only() {
    let config = InferenceConfig {
        quote_char: '\0',
        ..InferenceConfig::default()
    };
    let source = MemorySource::from_lines("mem", &["a;b", "c;d"]);
    let sample = frequency::sample(&source, config.quote()).expect("sample");
    assert_eq!(sample.quoted.line_count, 0);
    assert_eq!(
        detect::detect_layout(&sample, &config),
        Layout::Delimited {
            separator: ';',
            quote: None
        }
    );
}

#[test]
fn single_line_without_separator_is_non_tabular() {
    let source = MemorySource::from_lines("mem", &["just one line"]);
    let config = InferenceConfig::default();
    let sample = frequency::sample(&source, config.quote()).expect("sample");
    assert_eq!(detect::pick(&sample.raw, &config.separators).uncertainty, NO_SEPARATOR);
    assert_eq!(
        detect::detect_layout(&sample, &config),
        Layout::NonTabular {
            kind: ContentKind::Textfile
        }
    );
}

#[test]
fn uniform_lines_without_boundaries_are_undetermined() {
    let source = MemorySource::from_lines("mem", &["abcdef", "ghijkl", "mnopqr"]);
    let config = InferenceConfig::default();
    let sample = frequency::sample(&source, config.quote()).expect("sample");
    assert_eq!(detect::detect_layout(&sample, &config), Layout::Undetermined);
}

#[test]
fn fixed_width_report_from_file() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_lines(
        "fixed.txt",
        &[
            "0001 Widget      12.50 2024-01-01",
            "0002 Gadget       3.75 2024-02-11",
            "0003 Sprocket   100.00 2024-03-21",
        ],
    );
    let source = FileSource::new(&path, UTF_8);
    let sample = frequency::sample(&source, Some('"')).expect("sample");
    let widths = fixed_width::detect_widths(&sample.lines, Some('"')).expect("fixed width");
    assert_eq!(widths.iter().sum::<usize>(), 33);
    assert!(widths.len() >= 3);
}
