//! Watch-list parsing and matching
//!
//! The operator enters watch codes as a comma-separated list, optionally with
//! a quantity suffix: `GH10.234A, NHAN.1A x 5`. The quantity is stripped and
//! ignored; it is accepted only so lists copied from an export parse cleanly.

use std::collections::HashSet;

/// Literal separating a code from its (ignored) quantity
const COUNT_DELIMITER: &str = " x ";

/// Normalized set of watch codes
///
/// Immutable once parsed; a new list replaces the set wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertRuleSet {
    codes: HashSet<String>,
}

impl AlertRuleSet {
    /// Parse a raw comma-separated watch list
    ///
    /// Each piece is lower-cased and trimmed, then cut at the first `" x "`.
    /// Pieces that end up empty are dropped.
    pub fn parse(raw: &str) -> Self {
        let codes = raw
            .split(',')
            .map(|piece| piece.to_lowercase())
            .filter_map(|piece| {
                let trimmed = piece.trim();
                let code = match trimmed.find(COUNT_DELIMITER) {
                    Some(pos) => &trimmed[..pos],
                    None => trimmed,
                };
                if code.is_empty() {
                    None
                } else {
                    Some(code.to_string())
                }
            })
            .collect();

        Self { codes }
    }

    /// True if `code`, or `code` with an `a` variant letter appended, is watched
    ///
    /// Watch lists are usually entered with the `A` variant suffix while some
    /// labels omit it, so `NHAN.1` matches a watch entry of `NHAN.1A`.
    pub fn is_watched(&self, code: &str) -> bool {
        let lowered = code.to_lowercase();
        if self.codes.contains(&lowered) {
            return true;
        }
        self.codes.contains(&format!("{}a", lowered))
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.codes.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Normalized codes in sorted order
    pub fn sorted_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.codes.iter().cloned().collect();
        codes.sort();
        codes
    }
}
