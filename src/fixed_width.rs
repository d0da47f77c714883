//! Fixed-width boundary detection.
//!
//! When no separator stands out, sampled lines are scanned for positions where
//! a column plausibly begins: the end of a run of spaces, or a switch between
//! numeric and alphabetic text. Positions shared by (nearly) every line become
//! column boundaries.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

/// Fewer boundaries than this means the input is not fixed width.
pub const MIN_BOUNDARIES: usize = 3;

const CONNECTORS: &str = ",.-+:/\\";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Unknown,
    Text,
    Numeric,
}

#[derive(Debug, Default)]
pub struct BoundaryScan {
    quote: Option<char>,
    big_gaps: BTreeMap<usize, usize>,
    word_starts: BTreeMap<usize, usize>,
    lines: usize,
}

impl BoundaryScan {
    pub fn new(quote: Option<char>) -> Self {
        Self {
            quote,
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, line: &str) {
        let mut quoted = false;
        let mut spaces = 0usize;
        let mut class = CharClass::Unknown;
        let mut length = 0usize;

        for (pos, ch) in line.chars().enumerate() {
            length = pos + 1;
            if Some(ch) == self.quote {
                quoted = !quoted;
                continue;
            }
            if quoted {
                continue;
            }
            if ch == ' ' {
                // A single space right after a number already separates columns.
                if class == CharClass::Numeric {
                    class = CharClass::Unknown;
                    spaces += 1;
                }
                spaces += 1;
                if spaces > 1 {
                    *self.big_gaps.entry(pos + 1).or_insert(0) += 1;
                }
                continue;
            }

            let mut starts_column = spaces > 1;
            spaces = 0;
            if !CONNECTORS.contains(ch) {
                if ch.is_ascii_digit() {
                    starts_column |= class == CharClass::Text;
                    class = CharClass::Numeric;
                } else {
                    starts_column |= class == CharClass::Numeric;
                    class = CharClass::Text;
                }
            }
            if starts_column {
                *self.word_starts.entry(pos).or_insert(0) += 1;
            }
        }

        *self.word_starts.entry(length).or_insert(0) += 1;
        self.lines += 1;
    }

    /// Boundary positions agreed on by the sample, ascending.
    pub fn boundaries(&self) -> Vec<usize> {
        let gap_threshold = self.lines.saturating_sub(1);
        let mut positions = BTreeSet::new();

        // Keep only the right-most position of each consecutive block of gaps.
        let mut previous: Option<usize> = None;
        for (&pos, _) in self
            .big_gaps
            .iter()
            .rev()
            .filter(|(_, count)| **count >= gap_threshold)
        {
            if previous != Some(pos + 1) {
                positions.insert(pos);
            }
            previous = Some(pos);
        }

        positions.extend(
            self.word_starts
                .iter()
                .filter(|(_, count)| **count == self.lines)
                .map(|(pos, _)| *pos),
        );
        positions.into_iter().collect()
    }

    /// Column widths, or `None` when too few boundaries were found.
    pub fn finalize(self) -> Option<Vec<usize>> {
        let boundaries = self.boundaries();
        debug!(
            "Fixed-width boundaries over {} line(s): {:?}",
            self.lines, boundaries
        );
        if boundaries.len() < MIN_BOUNDARIES {
            return None;
        }
        let mut start = 0;
        let widths = boundaries
            .into_iter()
            .map(|end| {
                let width = end - start;
                start = end;
                width
            })
            .filter(|width| *width > 0)
            .collect::<Vec<_>>();
        (widths.len() >= MIN_BOUNDARIES).then_some(widths)
    }
}

pub fn detect_widths<S: AsRef<str>>(lines: &[S], quote: Option<char>) -> Option<Vec<usize>> {
    let mut scan = BoundaryScan::new(quote);
    for line in lines {
        scan.ingest(line.as_ref());
    }
    scan.finalize()
}
