//! Per-character frequency sampling.
//!
//! The separator detector works from the first [`SAMPLE_LINES`] lines of the
//! input. Each line feeds two [`FrequencyTable`]s: a raw one and a quote-aware
//! one that ignores everything between quote characters. Tables finalize into
//! [`CharStatistics`], which carry the total occurrences and population
//! variance of every character seen.

use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::source::LineSource;

pub const SAMPLE_LINES: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharStat {
    pub ch: char,
    pub occurrences: u64,
    pub variance: f64,
}

/// Finalized character statistics, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharStatistics {
    pub chars: Vec<CharStat>,
    pub line_count: usize,
}

impl CharStatistics {
    pub fn get(&self, ch: char) -> Option<&CharStat> {
        self.chars.iter().find(|stat| stat.ch == ch)
    }

    pub fn occurrences(&self, ch: char) -> u64 {
        self.get(ch).map_or(0, |stat| stat.occurrences)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    occurrences: u64,
    squares: u128,
}

/// Accumulates per-line character counts.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    order: Vec<char>,
    tallies: HashMap<char, Tally>,
    lines: usize,
    scratch: HashMap<char, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_line(&mut self, line: &str) {
        self.scratch.clear();
        for ch in line.chars() {
            *self.scratch.entry(ch).or_insert(0) += 1;
        }
        self.commit_scratch(line);
    }

    /// Count only characters outside quotes. The quote state starts closed; a
    /// line that ends inside a quote is ignored entirely. Returns whether the
    /// line was counted.
    pub fn ingest_line_quoted(&mut self, line: &str, quote: char) -> bool {
        self.scratch.clear();
        let mut quoted = false;
        for ch in line.chars() {
            if ch == quote {
                quoted = !quoted;
            } else if !quoted {
                *self.scratch.entry(ch).or_insert(0) += 1;
            }
        }
        if quoted {
            self.scratch.clear();
            return false;
        }
        self.commit_scratch(line);
        true
    }

    fn commit_scratch(&mut self, line: &str) {
        // Walk the line again so new characters are registered in first-seen order.
        for ch in line.chars() {
            if let Some(count) = self.scratch.remove(&ch) {
                let tally = self.tallies.entry(ch).or_insert_with(|| {
                    self.order.push(ch);
                    Tally::default()
                });
                tally.occurrences += count;
                tally.squares += u128::from(count) * u128::from(count);
            }
        }
        self.lines += 1;
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn finalize(self) -> CharStatistics {
        let n = self.lines as u128;
        let chars = self
            .order
            .iter()
            .map(|ch| {
                let tally = self.tallies[ch];
                CharStat {
                    ch: *ch,
                    occurrences: tally.occurrences,
                    variance: population_variance(n, tally.occurrences, tally.squares),
                }
            })
            .collect();
        CharStatistics {
            chars,
            line_count: self.lines,
        }
    }
}

/// `(n·Σf² − (Σf)²) / n²`, evaluated in integers so a constant count yields exactly 0.
fn population_variance(n: u128, sum: u64, squares: u128) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let sum = u128::from(sum);
    let numerator = (n * squares).saturating_sub(sum * sum);
    if numerator == 0 {
        return 0.0;
    }
    numerator as f64 / (n * n) as f64
}

/// The sampled head of an input.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub raw: CharStatistics,
    pub quoted: CharStatistics,
    pub lines: Vec<String>,
}

impl Sample {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// True when every sampled line has the same character length.
    pub fn line_lengths_uniform(&self) -> bool {
        let mut lengths = self.lines.iter().map(|line| line.chars().count());
        match lengths.next() {
            Some(first) => lengths.all(|len| len == first),
            None => true,
        }
    }
}

/// Read up to [`SAMPLE_LINES`] lines from a fresh reader and tabulate them.
pub fn sample(source: &dyn LineSource, quote: Option<char>) -> Result<Sample> {
    let mut raw = FrequencyTable::new();
    let mut quoted = FrequencyTable::new();
    let mut lines = Vec::with_capacity(SAMPLE_LINES);
    let mut reader = source.open()?;
    while lines.len() < SAMPLE_LINES {
        let Some(line) = reader.next_line()? else {
            break;
        };
        raw.ingest_line(&line);
        if let Some(quote) = quote {
            quoted.ingest_line_quoted(&line, quote);
        }
        lines.push(line);
    }
    debug!(
        "Sampled {} line(s) from {} ({} quote-aware)",
        lines.len(),
        source.describe(),
        quoted.line_count()
    );
    Ok(Sample {
        raw: raw.finalize(),
        quoted: quoted.finalize(),
        lines,
    })
}
