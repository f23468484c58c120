//! Canonical bus identifiers.
//!
//! Bus ids reach the store in several spellings (`SIET-005`, `siet 5`,
//! `Bus 5`, `5`). [`BusId::parse`] folds them into one canonical
//! `PREFIX-NNN` form and [`BusId::query_variants`] lists the legacy
//! spellings so a single `IN` filter finds documents written by older
//! clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "SIET";

/// A normalized bus identifier such as `SIET-005`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// Normalizes `raw` using `prefix` for bare numbers.
    ///
    /// Input that carries no route number is kept as-is (trimmed and
    /// upper-cased) so unusual ids still compare consistently.
    pub fn parse(raw: &str, prefix: &str) -> Self {
        let trimmed = raw.trim();
        match route_number(trimmed, prefix) {
            Some(number) => Self(format!("{}-{:03}", prefix.to_uppercase(), number)),
            None => Self(trimmed.to_uppercase()),
        }
    }

    /// Normalizes `raw` with [`DEFAULT_PREFIX`].
    pub fn new(raw: &str) -> Self {
        Self::parse(raw, DEFAULT_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Route number, when the id is canonical under `prefix`.
    pub fn number(&self, prefix: &str) -> Option<u32> {
        let (head, digits) = self.0.rsplit_once('-')?;
        if !head.eq_ignore_ascii_case(prefix.trim()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Every spelling a stored document may use for this bus, canonical first.
    ///
    /// Bare-number spellings belong to the configured `prefix`, so ids under
    /// any other prefix only match themselves.
    pub fn query_variants(&self, prefix: &str) -> Vec<String> {
        let Some(number) = self.number(prefix) else {
            return vec![self.0.clone()];
        };
        let prefix = prefix.trim().to_uppercase();

        let candidates = [
            self.0.clone(),
            format!("{prefix}-{number}"),
            format!("{prefix}{number:03}"),
            format!("{prefix}{number}"),
            format!("{prefix} {number}"),
            format!("Bus {number}"),
            format!("{number:03}"),
            number.to_string(),
        ];

        let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the route number from `raw` if it is one of the known spellings.
fn route_number(raw: &str, prefix: &str) -> Option<u32> {
    let upper = raw.to_uppercase();
    let prefix = prefix.to_uppercase();

    let rest = upper
        .strip_prefix(prefix.as_str())
        .or_else(|| upper.strip_prefix("BUS"))
        .unwrap_or(upper.as_str());
    let digits = rest.trim_start_matches(|c: char| c == '-' || c == '_' || c == '#' || c.is_whitespace());

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
