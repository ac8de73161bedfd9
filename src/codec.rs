//! Decimal-string codec for persisted fields.
//!
//! The storage medium only holds strings, one numeric field per key. Each
//! field has exactly one encode/decode pair, selected by [`ProgressField`].
//! Decoding is total: an absent or non-numeric raw value produces the
//! numeric default `0` and reports the defaulting, so callers can tell a
//! repaired read from a clean one. The validator then lifts defaulted
//! fields back into their bounds.

use std::fmt;

use crate::progress::{ProgressField, ProgressRecord};

/// A decode that had to fall back to the default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeIssue {
    pub field: ProgressField,
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_decode_defaulted", self.field.base_key())
    }
}

/// Encode one field of a record as its storage string.
///
/// Integral fields print without a fractional part; float fields use the
/// shortest decimal form that round-trips (`f64::to_string`, which already
/// omits a trailing `.0` for whole numbers).
pub fn encode_field(record: &ProgressRecord, field: ProgressField) -> String {
    match field {
        ProgressField::MiningLevel => record.mining_level.to_string(),
        ProgressField::MiningStreak => record.mining_streak.to_string(),
        _ => record.get(field).to_string(),
    }
}

/// Decode one raw storage value into `record`.
///
/// Returns the issue when the raw value was absent or non-numeric (a parse
/// to a non-finite float counts as non-numeric — "NaN" in storage is
/// corruption, not a number).
pub fn decode_field(
    record: &mut ProgressRecord,
    field: ProgressField,
    raw: Option<&str>,
) -> Option<DecodeIssue> {
    let parsed = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite());
    match parsed {
        Some(value) => {
            record.set(field, value);
            None
        }
        None => {
            record.set(field, 0.0);
            Some(DecodeIssue { field })
        }
    }
}

/// Encode the gem counter.
pub fn encode_gems(gems: i64) -> String {
    gems.to_string()
}

/// Decode the gem counter. Tolerates a fractional stored value by
/// truncating; non-numeric values default to 0, reported via the flag.
pub fn decode_gems(raw: Option<&str>) -> (i64, bool) {
    let parsed = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite());
    match parsed {
        Some(value) => (value as i64, false),
        None => (0, true),
    }
}
