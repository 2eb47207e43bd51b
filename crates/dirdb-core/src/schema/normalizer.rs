//! Value normalizers and comparators.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Maps a raw attribute value to its canonical form.
///
/// Index order is the natural order of normalized strings, so a normalizer
/// must be idempotent.
pub trait Normalizer: Send + Sync + fmt::Debug {
    fn normalize(&self, value: &str) -> Result<String>;
}

/// Orders normalized values.
pub trait Comparator: Send + Sync + fmt::Debug {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Trims the value, collapses inner whitespace runs to one space and
/// lowercases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepTrimToLower;

/// Like [`DeepTrimToLower`] but preserves case.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepTrim;

/// Removes all whitespace; rejects anything but digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericString;

/// Removes spaces and hyphens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelephoneNumber;

/// Returns the value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

/// Byte-wise string order; agrees with index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalComparator;

fn deep_trim(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Normalizer for DeepTrimToLower {
    fn normalize(&self, value: &str) -> Result<String> {
        Ok(deep_trim(value).to_lowercase())
    }
}

impl Normalizer for DeepTrim {
    fn normalize(&self, value: &str) -> Result<String> {
        Ok(deep_trim(value))
    }
}

impl Normalizer for NumericString {
    fn normalize(&self, value: &str) -> Result<String> {
        let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(digits)
        } else {
            Err(Error::IllegalArgument(format!(
                "'{}' is not a numeric string",
                value
            )))
        }
    }
}

impl Normalizer for TelephoneNumber {
    fn normalize(&self, value: &str) -> Result<String> {
        Ok(value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect())
    }
}

impl Normalizer for Identity {
    fn normalize(&self, value: &str) -> Result<String> {
        Ok(value.to_string())
    }
}

impl Comparator for LexicalComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_trim_to_lower() {
        assert_eq!(
            DeepTrimToLower.normalize("  JOhnny   WAlkeR ").unwrap(),
            "johnny walker"
        );
        assert_eq!(DeepTrimToLower.normalize("").unwrap(), "");
        let once = DeepTrimToLower.normalize(" A  b ").unwrap();
        assert_eq!(DeepTrimToLower.normalize(&once).unwrap(), once);
    }

    #[test]
    fn test_deep_trim_keeps_case() {
        assert_eq!(DeepTrim.normalize(" Good\tTimes ").unwrap(), "Good Times");
    }

    #[test]
    fn test_numeric_string() {
        assert_eq!(NumericString.normalize(" 12 345 ").unwrap(), "12345");
        assert!(matches!(
            NumericString.normalize("12a"),
            Err(Error::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_telephone_number() {
        assert_eq!(
            TelephoneNumber.normalize("+1 408-555 1234").unwrap(),
            "+14085551234"
        );
    }

    #[test]
    fn test_lexical_comparator() {
        assert_eq!(LexicalComparator.compare("10", "2"), Ordering::Less);
        assert_eq!(LexicalComparator.compare("b", "b"), Ordering::Equal);
    }
}
