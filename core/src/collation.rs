//! Locale-aware case folding and text ordering.
//!
//! Default Unicode lower-casing is wrong for Turkish: `I` must fold to dotless `ı` and `İ` to `i`,
//! and the alphabet orders `ç ğ ı ö ş ü` right after their base letters instead of after `z`.
//! Everything that searches or sorts text goes through [`Locale`] so the rule lives in one place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const COMBINING_DOT_ABOVE: char = '\u{0307}';

const TURKISH_ALPHABET: [char; 32] = [
    'a', 'b', 'c', 'ç', 'd', 'e', 'f', 'g', 'ğ', 'h', 'ı', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'ö', 'p', 'q', 'r', 's', 'ş', 't', 'u',
    'ü', 'v', 'w', 'x', 'y', 'z',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Turkish case folding and alphabet order
    #[default]
    Turkish,
    /// Plain Unicode lower-casing, code point order
    Root,
}

impl Locale {
    /// Lower-case `s` for case-insensitive matching under this locale
    pub fn fold_case(&self, s: &str) -> String {
        match self {
            Locale::Root => s.to_lowercase(),
            Locale::Turkish => {
                let mut folded = String::with_capacity(s.len());
                let mut chars = s.chars().peekable();
                while let Some(c) = chars.next() {
                    match c {
                        // decomposed İ is I followed by a combining dot
                        'I' if chars.peek() == Some(&COMBINING_DOT_ABOVE) => {
                            chars.next();
                            folded.push('i');
                        }
                        'I' => folded.push('ı'),
                        'İ' => folded.push('i'),
                        c => folded.extend(c.to_lowercase()),
                    }
                }
                folded
            }
        }
    }

    /// Case-insensitive substring test. `folded_needle` must already be folded with this locale.
    pub fn contains_folded(&self, haystack: &str, folded_needle: &str) -> bool {
        if folded_needle.is_empty() {
            return true;
        }
        self.fold_case(haystack).contains(folded_needle)
    }

    /// Total order over text: alphabet order ignoring case first, then raw code points so that
    /// strings differing only in case still order deterministically.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let fa = self.fold_case(a);
        let fb = self.fold_case(b);
        fa.chars().map(|c| self.weight(c)).cmp(fb.chars().map(|c| self.weight(c))).then_with(|| a.cmp(b))
    }

    /// Primary collation weight of an already folded character. Separators, digits and punctuation
    /// sort before letters; letters outside the alphabet sort after it.
    fn weight(&self, c: char) -> (u8, u32) {
        match self {
            Locale::Turkish => {
                let base = match c {
                    'â' => 'a',
                    'î' => 'i',
                    'û' => 'u',
                    c => c,
                };
                if let Some(idx) = TURKISH_ALPHABET.iter().position(|&letter| letter == base) {
                    (1, idx as u32)
                } else if c.is_alphabetic() {
                    (2, c as u32)
                } else {
                    (0, c as u32)
                }
            }
            Locale::Root => {
                if c.is_alphabetic() {
                    (1, c as u32)
                } else {
                    (0, c as u32)
                }
            }
        }
    }
}

/// Types with a deterministic total order for sorting
pub trait Collatable {
    fn collate(&self, other: &Self) -> Ordering;
}

impl Collatable for i64 {
    fn collate(&self, other: &Self) -> Ordering { self.cmp(other) }
}

impl Collatable for bool {
    fn collate(&self, other: &Self) -> Ordering { self.cmp(other) }
}

impl Collatable for NaiveDate {
    fn collate(&self, other: &Self) -> Ordering { self.cmp(other) }
}

// NaN sorts last, after +inf
impl Collatable for f64 {
    fn collate(&self, other: &Self) -> Ordering {
        match (self.is_nan(), other.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.total_cmp(other),
        }
    }
}
