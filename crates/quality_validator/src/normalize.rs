//! Field normalization helpers.
//!
//! These are the reference definitions of "clean" text and of canonical enum
//! codes. Rules compare raw values against them; nothing here mutates data.

use quality_core::{DataValue, EnumMapping};

/// Strips leading and trailing whitespace, never internal whitespace.
///
/// Idempotent: normalizing an already normalized value is a no-op.
///
/// ```rust
/// use quality_validator::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  Mountain  Bike \t"), "Mountain  Bike");
/// ```
pub fn normalize_whitespace(s: &str) -> &str {
    s.trim()
}

/// Returns true if the value carries no leading or trailing whitespace.
pub fn is_clean(s: &str) -> bool {
    s == normalize_whitespace(s)
}

/// Lookup form of an enum code: trimmed and upper-cased.
pub fn canonical_key(s: &str) -> String {
    EnumMapping::canonical_key(s)
}

/// Canonical form of any cell value, used to compare coded values.
///
/// Nulls have no canonical form. Non-text scalars use their display form.
pub fn canonical_value(value: &DataValue) -> Option<String> {
    match value {
        DataValue::Null => None,
        DataValue::String(s) => Some(canonical_key(s)),
        other => Some(canonical_key(&other.to_string())),
    }
}

/// Maps a coded value to its label, falling back to `default`.
///
/// Total: every input yields a label.
///
/// ```rust
/// use quality_core::{DataValue, EnumMapping};
/// use quality_validator::canonicalize_enum;
///
/// let gender = EnumMapping::new([("F", "Female"), ("M", "Male")]);
/// assert_eq!(canonicalize_enum(&DataValue::from(" f"), &gender, "n/a"), "Female");
/// assert_eq!(canonicalize_enum(&DataValue::Null, &gender, "n/a"), "n/a");
/// assert_eq!(canonicalize_enum(&DataValue::Int(7), &gender, "n/a"), "n/a");
/// ```
pub fn canonicalize_enum(value: &DataValue, mapping: &EnumMapping, default: &str) -> String {
    canonical_value(value)
        .and_then(|code| mapping.get(&code).map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}
