use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 1-based spreadsheet coordinates; `"B14"` parses to column 2, row 14.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub col: u32,
    pub row: u32,
}

impl CellAddress {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split_idx = s.find(|c: char| c.is_ascii_digit())?;
        let (col_str, row_str) = s.split_at(split_idx);

        let row = row_str.parse::<u32>().ok()?;
        let col = column_index(col_str)?;
        if row == 0 {
            return None;
        }

        Some(Self { col, row })
    }

    pub fn with_row(self, row: u32) -> Self {
        Self { row, ..self }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl Ord for CellAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        // Row-major ordering
        match self.row.cmp(&other.row) {
            Ordering::Equal => self.col.cmp(&other.col),
            ord => ord,
        }
    }
}

impl PartialOrd for CellAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bijective base-26 column letters: 1 is "A", 26 is "Z", 27 is "AA".
pub fn column_letters(mut col: u32) -> String {
    debug_assert!(col >= 1);
    let mut letters = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.insert(0, char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters
}

fn column_index(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col = 0u32;
    for c in s.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(col)
}
