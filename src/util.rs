use crate::ArcStr;
use serde::{de, Deserialize, Deserializer};
use std::{fs, io, path::Path};

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers for serde to parse fields with quirks.

/// Is this cell one of the ways the exports spell a missing value.
pub fn is_null(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("na")
}

/// Parse a string, but map "null", "NA" and "NaN" to `None` (in addition to the default
/// "" -> None mapping)
pub fn optional_string<'de, D>(d: D) -> Result<Option<ArcStr>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(d)?;
    Ok(s.and_then(|s| {
        let s = s.trim();
        if is_null(s) {
            None
        } else {
            Some(s.into())
        }
    }))
}

/// Parse a whole, non-negative number, also accepting floats like `2.0` that appear when a
/// column went through a dataframe with missing values.
pub fn whole_number<'de, D>(d: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if let Ok(v) = s.parse::<usize>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0. && v == v.floor() => Ok(v as usize),
        _ => Err(de::Error::custom(format!("expected a whole number, found \"{}\"", s))),
    }
}

/// Remove all whitespace, e.g. to turn a subtype name into a code.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|ch| !ch.is_whitespace()).collect()
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

#[test]
fn test_strip_whitespace() {
    assert_eq!(strip_whitespace("KRAS p.G12 D"), "KRASp.G12D");
    assert_eq!(strip_whitespace("\tEGFR\n"), "EGFR");
}

#[test]
fn test_is_null() {
    assert!(is_null(""));
    assert!(is_null("NaN"));
    assert!(is_null("null"));
    assert!(!is_null("NAT"));
}
