//! Plain-text column table for terminal output.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Default)]
pub struct TextTable {
    headers: Vec<String>,
    alignments: Vec<Alignment>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, header: &str, alignment: Alignment) -> Self {
        self.headers.push(header.to_string());
        self.alignments.push(alignment);
        self
    }

    /// Cells past the declared columns are dropped; missing cells render blank.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row = cells
            .into_iter()
            .take(self.headers.len())
            .map(|cell| flatten(&cell.into()))
            .collect::<Vec<_>>();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths = self
            .headers
            .iter()
            .map(|header| header.chars().count().max(3))
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }
}

/// Line breaks and tabs inside a cell would break the grid.
fn flatten(cell: &str) -> String {
    cell.chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect()
}

fn write_line(
    f: &mut fmt::Formatter<'_>,
    cells: &[String],
    widths: &[usize],
    alignments: &[Alignment],
) -> fmt::Result {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let padding = " ".repeat(width.saturating_sub(cell.chars().count()));
        match alignments.get(idx).copied().unwrap_or_default() {
            Alignment::Left => {
                line.push_str(cell);
                line.push_str(&padding);
            }
            Alignment::Right => {
                line.push_str(&padding);
                line.push_str(cell);
            }
        }
    }
    writeln!(f, "{}", line.trim_end())
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        write_line(f, &self.headers, &widths, &[])?;
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        write_line(f, &rule, &widths, &[])?;
        for row in &self.rows {
            write_line(f, row, &widths, &self.alignments)?;
        }
        Ok(())
    }
}
