//! Natural ordering for display names and metadata values.
//!
//! A [`NaturalKey`] splits a string into alternating text and digit runs so
//! that embedded numbers compare by value:
//!
//! - `"img2"` < `"img10"`
//! - `"2"` < `"10"`
//! - `"-3"` < `"1"` (a sign at the start of the string, or after whitespace,
//!   belongs to the number)
//!
//! Text runs compare case-insensitively by lowercased code points. There is
//! no locale collation: accented letters sort after `z`, not beside their
//! base letter. Keys that are otherwise equal
//! (`"Photo"` vs `"photo"`, `"007"` vs `"7"`) fall back to the raw string so
//! the order is total and deterministic.

use std::cmp::Ordering;

/// An integer of arbitrary length, kept as its significant digits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Numeric {
    negative: bool,
    /// Digits without leading zeros; `""` means zero.
    digits: String,
}

impl Numeric {
    fn parse(sign: Option<char>, run: &str) -> Self {
        let digits = run.trim_start_matches('0').to_string();
        Self {
            // -0 is 0
            negative: sign == Some('-') && !digits.is_empty(),
            digits,
        }
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.digits
            .len()
            .cmp(&other.digits.len())
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl Ord for Numeric {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keys always start with a (possibly empty) text run and then alternate, so
/// parts at the same index are always the same variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Text(String),
    Number(Numeric),
}

/// Sort key implementing natural order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey {
    parts: Vec<Part>,
    raw: String,
}

impl NaturalKey {
    pub fn new(s: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = s.char_indices().peekable();
        let mut prev: Option<char> = None;

        while let Some((i, c)) = chars.next() {
            let sign_allowed = prev.is_none_or(char::is_whitespace);
            let signed_start = (c == '-' || c == '+')
                && sign_allowed
                && chars.peek().is_some_and(|(_, n)| n.is_ascii_digit());

            if c.is_ascii_digit() || signed_start {
                let sign = signed_start.then_some(c);
                let start = if signed_start { i + c.len_utf8() } else { i };
                let mut end = if signed_start { start } else { i + 1 };
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = j + 1;
                    chars.next();
                }
                parts.push(Part::Text(std::mem::take(&mut text)));
                parts.push(Part::Number(Numeric::parse(sign, &s[start..end])));
                prev = s[..end].chars().next_back();
            } else {
                text.extend(c.to_lowercase());
                prev = Some(c);
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(Part::Text(text));
        }

        Self {
            parts,
            raw: s.to_string(),
        }
    }
}

/// Compare two strings in natural order.
pub fn compare(a: &str, b: &str) -> Ordering {
    NaturalKey::new(a).cmp(&NaturalKey::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(items: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        v.sort_by_key(|s| NaturalKey::new(s));
        v
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("img2", "img10"), Ordering::Less);
        assert_eq!(
            sorted(&["photo10.jpg", "photo1.jpg", "photo2.jpg"]),
            vec!["photo1.jpg", "photo2.jpg", "photo10.jpg"]
        );
    }

    #[test]
    fn multiple_numeric_runs() {
        assert_eq!(
            sorted(&["v1.10", "v1.9", "v1.2", "v0.99"]),
            vec!["v0.99", "v1.2", "v1.9", "v1.10"]
        );
    }

    #[test]
    fn text_is_case_insensitive() {
        assert_eq!(sorted(&["banana", "Apple", "cherry"]), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn ties_broken_by_raw_string() {
        assert_eq!(compare("Photo", "photo"), Ordering::Less);
        assert_eq!(compare("007", "7"), Ordering::Less);
        assert_eq!(compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn leading_sign_is_numeric() {
        assert_eq!(sorted(&["10", "-3", "1", "+2"]), vec!["-3", "1", "+2", "10"]);
        assert_eq!(compare("-10", "-2"), Ordering::Less);
    }

    #[test]
    fn dash_inside_word_is_text() {
        // "img-2" is img, "-", 2 rather than img, -2
        assert_eq!(compare("img-2", "img-10"), Ordering::Less);
    }

    #[test]
    fn numbers_sort_before_text() {
        assert_eq!(compare("10", "abc"), Ordering::Less);
        assert_eq!(compare("", "a"), Ordering::Less);
    }

    #[test]
    fn very_long_numbers_do_not_overflow() {
        let big = "123456789012345678901234567890";
        let bigger = "1234567890123456789012345678901";
        assert_eq!(compare(big, bigger), Ordering::Less);
    }

    #[test]
    fn zero_with_sign_equals_zero_numerically() {
        // Only the raw tie-break separates them
        assert_eq!(compare("-0", "0"), Ordering::Less);
        assert_eq!(compare("-0", "1"), Ordering::Less);
    }
}
