use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_NOTE_LEN: usize = 1000;

pub type ValidationResult = std::result::Result<(), ValidationError>;

const SUSPICIOUS_PATTERNS: &[&str] = &[
    r"(?i)<\s*script",
    r"(?i)javascript\s*:",
    r"(?i)\bon[a-z]+\s*=",
    r"(?i)'\s*or\s+'?\d+'?\s*=\s*'?\d+",
    r"(?i);\s*(drop|delete|truncate|alter)\s+table",
    r"(?i)\bunion\s+(all\s+)?select\b",
    r"--",
];

struct TextGuard {
    patterns: Vec<Regex>,
}

impl TextGuard {
    fn global() -> &'static TextGuard {
        static GUARD: OnceLock<TextGuard> = OnceLock::new();
        GUARD.get_or_init(|| TextGuard {
            patterns: SUSPICIOUS_PATTERNS
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
        })
    }

    fn is_suspicious(&self, value: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(value))
    }
}

/// Required free-text field: trimmed non-empty, bounded, free of injection markers.
pub fn require_text(field: &str, value: &str, max_len: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    optional_text(field, Some(value), max_len)
}

pub fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> ValidationResult {
    let Some(value) = value else {
        return Ok(());
    };
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    if TextGuard::global().is_suspicious(value) {
        return Err(ValidationError::new(field, "contains a forbidden pattern"));
    }
    Ok(())
}

pub fn non_negative(field: &str, value: f64) -> ValidationResult {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, "must be a finite number >= 0"));
    }
    Ok(())
}

pub fn positive(field: &str, value: f64) -> ValidationResult {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(field, "must be a finite number > 0"));
    }
    Ok(())
}

/// Fraction in (0, 1].
pub fn fraction(field: &str, value: f64) -> ValidationResult {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(ValidationError::new(field, "must be within (0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass() {
        assert!(require_text("name", "Tepung Terigu Segitiga Biru", MAX_NAME_LEN).is_ok());
        assert!(require_text("name", "Gula pasir 1kg (curah)", MAX_NAME_LEN).is_ok());
        assert!(optional_text("notes", None, MAX_NOTE_LEN).is_ok());
    }

    #[test]
    fn injection_markers_are_rejected() {
        for value in [
            "<script>alert(1)</script>",
            "<img src=x onerror=alert(1)>",
            "javascript:void(0)",
            "x' OR 1=1",
            "roti; DROP TABLE recipes",
            "1 UNION SELECT password FROM users",
            "name -- comment",
        ] {
            let err = require_text("name", value, MAX_NAME_LEN).unwrap_err();
            assert_eq!(err.field, "name", "{value}");
        }
    }

    #[test]
    fn empty_and_oversized_values_are_rejected() {
        assert!(require_text("name", "   ", MAX_NAME_LEN).is_err());
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(require_text("name", &long, MAX_NAME_LEN).is_err());
    }

    #[test]
    fn numeric_guards() {
        assert!(non_negative("price", 0.0).is_ok());
        assert!(non_negative("price", -1.0).is_err());
        assert!(non_negative("price", f64::NAN).is_err());
        assert!(positive("target", 0.0).is_err());
        assert!(fraction("threshold", 0.8).is_ok());
        assert!(fraction("threshold", 1.0).is_ok());
        assert!(fraction("threshold", 0.0).is_err());
        assert!(fraction("threshold", 1.2).is_err());
    }
}
