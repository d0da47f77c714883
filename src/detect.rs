//! Separator and layout detection.
//!
//! Separator candidates are ranked by an ordered rule list; the index of the
//! first rule that yields a character is its uncertainty (0 is best). The raw
//! and quote-aware frequency tables are ranked independently and the better
//! result wins. Without a separator the sample is either classified as
//! non-tabular content or handed to the fixed-width scanner.

use log::debug;

use crate::{
    config::{InferenceConfig, SeparatorSet},
    fixed_width,
    frequency::{CharStat, CharStatistics, Sample},
    schema::{ContentKind, Layout},
};

/// Uncertainty reported when no rule matched.
pub const NO_SEPARATOR: usize = LADDER.len();

struct Rule {
    name: &'static str,
    select: fn(&CharStatistics, &SeparatorSet) -> Option<char>,
}

const LADDER: [Rule; 3] = [
    Rule {
        name: "preferred with zero variance",
        select: preferred_with_zero_variance,
    },
    Rule {
        name: "lowest variance on every line",
        select: lowest_variance,
    },
    Rule {
        name: "second lowest variance on every line",
        select: second_lowest_variance,
    },
];

fn preferred_with_zero_variance(stats: &CharStatistics, preferred: &SeparatorSet) -> Option<char> {
    stats
        .chars
        .iter()
        .filter(|stat| stat.variance == 0.0 && preferred.contains(stat.ch))
        .max_by(|a, b| {
            a.occurrences.cmp(&b.occurrences).then_with(|| {
                // Earlier in the preference order wins a tie.
                preferred.rank(b.ch).cmp(&preferred.rank(a.ch))
            })
        })
        .map(|stat| stat.ch)
}

/// Characters present at least once per line on average, by ascending variance.
/// The sort is stable, so equal variances keep first-seen order.
fn common_by_variance(stats: &CharStatistics) -> Vec<&CharStat> {
    let mut common = stats
        .chars
        .iter()
        .filter(|stat| stat.occurrences >= stats.line_count as u64)
        .collect::<Vec<_>>();
    common.sort_by(|a, b| a.variance.total_cmp(&b.variance));
    common
}

fn lowest_variance(stats: &CharStatistics, preferred: &SeparatorSet) -> Option<char> {
    common_by_variance(stats)
        .first()
        .map(|stat| stat.ch)
        .filter(|ch| preferred.contains(*ch))
}

fn second_lowest_variance(stats: &CharStatistics, preferred: &SeparatorSet) -> Option<char> {
    common_by_variance(stats)
        .get(1)
        .map(|stat| stat.ch)
        .filter(|ch| preferred.contains(*ch))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorPick {
    pub separator: Option<char>,
    pub uncertainty: usize,
}

pub fn pick(stats: &CharStatistics, preferred: &SeparatorSet) -> SeparatorPick {
    for (uncertainty, rule) in LADDER.iter().enumerate() {
        if let Some(separator) = (rule.select)(stats, preferred) {
            debug!(
                "Separator {:?} selected by rule '{}' (uncertainty {uncertainty})",
                separator, rule.name
            );
            return SeparatorPick {
                separator: Some(separator),
                uncertainty,
            };
        }
    }
    SeparatorPick {
        separator: None,
        uncertainty: NO_SEPARATOR,
    }
}

/// Choose between the raw and quote-aware picks. Returns the separator and
/// the quote character that stays active.
pub fn arbitrate(
    raw: SeparatorPick,
    raw_lines: usize,
    quoted: SeparatorPick,
    quoted_lines: usize,
    quote: Option<char>,
) -> (Option<char>, Option<char>) {
    if quoted.uncertainty < raw.uncertainty {
        return (quoted.separator, quote);
    }
    if raw.uncertainty < quoted.uncertainty || quoted_lines < raw_lines {
        return (raw.separator, None);
    }
    (quoted.separator, quote)
}

/// Label non-tabular content by its character makeup.
pub fn classify_content(stats: &CharStatistics) -> ContentKind {
    let open = stats.occurrences('<');
    let close = stats.occurrences('>');
    if close > 0 && open == close {
        return ContentKind::Xml;
    }
    let binary = stats
        .chars
        .iter()
        .any(|stat| (stat.ch as u32) < 32 && stat.ch != '\t');
    if binary {
        ContentKind::Binary
    } else {
        ContentKind::Textfile
    }
}

fn is_markup(stats: &CharStatistics) -> bool {
    classify_content(stats) == ContentKind::Xml
}

/// Determine the layout of a sample.
pub fn detect_layout(sample: &Sample, config: &InferenceConfig) -> Layout {
    let quote = config.quote();
    let raw = pick(&sample.raw, &config.separators);
    let quoted = if quote.is_some() {
        pick(&sample.quoted, &config.separators)
    } else {
        SeparatorPick {
            separator: None,
            uncertainty: NO_SEPARATOR,
        }
    };
    let (separator, quote) = arbitrate(
        raw,
        sample.raw.line_count,
        quoted,
        sample.quoted.line_count,
        quote,
    );
    debug!(
        "Raw pick {:?}, quote-aware pick {:?}, chosen separator {:?} with quote {:?}",
        raw, quoted, separator, quote
    );

    if let Some(separator) = separator {
        return Layout::Delimited { separator, quote };
    }

    if !sample.line_lengths_uniform() || sample.line_count() <= 1 || is_markup(&sample.raw) {
        let kind = classify_content(&sample.raw);
        debug!("No separator and no fixed layout; treating input as {}", kind.label());
        return Layout::NonTabular { kind };
    }

    match fixed_width::detect_widths(&sample.lines, config.quote()) {
        Some(widths) => Layout::FixedWidth { widths },
        None => Layout::Undetermined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FrequencyTable;

    fn stats(lines: &[&str]) -> CharStatistics {
        let mut table = FrequencyTable::new();
        for line in lines {
            table.ingest_line(line);
        }
        table.finalize()
    }

    fn sample_of(lines: &[&str], quote: char) -> Sample {
        let mut raw = FrequencyTable::new();
        let mut quoted = FrequencyTable::new();
        for line in lines {
            raw.ingest_line(line);
            quoted.ingest_line_quoted(line, quote);
        }
        Sample {
            raw: raw.finalize(),
            quoted: quoted.finalize(),
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }

    #[test]
    fn constant_preferred_separator_has_zero_uncertainty() {
        let picked = pick(&stats(&["a,b,c", "1,2,3", "x,y,z"]), &SeparatorSet::default());
        assert_eq!(
            picked,
            SeparatorPick {
                separator: Some(','),
                uncertainty: 0
            }
        );
    }

    #[test]
    fn zero_variance_tie_prefers_earlier_preferred_char() {
        let picked = pick(&stats(&["a;b,c", "1;2,3"]), &SeparatorSet::default());
        assert_eq!(picked.separator, Some(','));
    }

    #[test]
    fn zero_variance_prefers_more_occurrences() {
        let picked = pick(&stats(&["a;b;c,d", "1;2;3,4"]), &SeparatorSet::default());
        assert_eq!(picked.separator, Some(';'));
    }

    #[test]
    fn varying_count_falls_to_second_rule() {
        // The separator count varies; no other character appears on every line.
        let picked = pick(&stats(&["a;b", "c;d;e", "f;g"]), &SeparatorSet::default());
        assert_eq!(picked.separator, Some(';'));
        assert_eq!(picked.uncertainty, 1);
    }

    #[test]
    fn no_preferred_character_yields_none() {
        let picked = pick(&stats(&["abc", "def"]), &SeparatorSet::default());
        assert_eq!(picked.separator, None);
        assert_eq!(picked.uncertainty, NO_SEPARATOR);
    }

    #[test]
    fn arbitration_keeps_quote_when_quoted_table_wins() {
        let raw = SeparatorPick {
            separator: Some(','),
            uncertainty: 1,
        };
        let quoted = SeparatorPick {
            separator: Some(','),
            uncertainty: 0,
        };
        assert_eq!(arbitrate(raw, 3, quoted, 3, Some('"')), (Some(','), Some('"')));
    }

    #[test]
    fn arbitration_disables_quote_when_raw_wins_or_lines_dropped() {
        let best = SeparatorPick {
            separator: Some(';'),
            uncertainty: 0,
        };
        let worse = SeparatorPick {
            separator: None,
            uncertainty: NO_SEPARATOR,
        };
        assert_eq!(arbitrate(best, 3, worse, 3, Some('"')), (Some(';'), None));
        assert_eq!(arbitrate(best, 3, best, 2, Some('"')), (Some(';'), None));
        assert_eq!(arbitrate(best, 3, best, 3, Some('"')), (Some(';'), Some('"')));
    }

    #[test]
    fn quoted_commas_do_not_confuse_detection() {
        let sample = sample_of(
            &[
                "name;note",
                "\"Smith, J\";\"a,b,c\"",
                "\"Doe, K\";x",
            ],
            '"',
        );
        let layout = detect_layout(&sample, &InferenceConfig::default());
        assert_eq!(
            layout,
            Layout::Delimited {
                separator: ';',
                quote: Some('"')
            }
        );
    }

    #[test]
    fn markup_is_non_tabular() {
        let sample = sample_of(&["<a>1</a>", "<b>2</b>"], '"');
        assert_eq!(
            detect_layout(&sample, &InferenceConfig::default()),
            Layout::NonTabular {
                kind: ContentKind::Xml
            }
        );
    }

    #[test]
    fn ragged_text_is_textfile() {
        let sample = sample_of(&["hello there", "a much longer line of prose"], '"');
        assert_eq!(
            detect_layout(&sample, &InferenceConfig::default()),
            Layout::NonTabular {
                kind: ContentKind::Textfile
            }
        );
    }

    #[test]
    fn control_characters_mark_binary() {
        assert_eq!(classify_content(&stats(&["ab\u{1}c", "x"])), ContentKind::Binary);
        assert_eq!(classify_content(&stats(&["a\tb"])), ContentKind::Textfile);
    }

    #[test]
    fn uniform_lines_without_separator_become_fixed_width() {
        let sample = sample_of(
            &["Alice     0012 NY", "Bob       0345 CA", "Charlotte 6789 TX"],
            '"',
        );
        assert_eq!(
            detect_layout(&sample, &InferenceConfig::default()),
            Layout::FixedWidth {
                widths: vec![10, 5, 2]
            }
        );
    }
}
