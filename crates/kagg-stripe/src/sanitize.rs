//! Input Sanitization
//!
//! Every externally supplied value (form field, query parameter, shortcode
//! attribute) passes through one of these functions on its own. There is no
//! schema step: a missing or malformed field falls back to its own default
//! without affecting the others.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_DESCRIPTION: &str = "Custom Payment";
pub const DEFAULT_MODE: &str = "payment";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>|<[a-z/!?][^>]*>?").unwrap()
});
static OCTET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Plain single-line text with no markup
pub fn text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let stripped = OCTET_RE.replace_all(&stripped, "");
    SPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Lowercase ISO code, letters only
pub fn currency(raw: &str) -> String {
    let code: String = raw
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_lowercase)
        .collect();
    if code.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        code
    }
}

/// Leading integer of the input; anything non-numeric is 0
pub fn integer(raw: &str) -> i64 {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0);
    if negative { -value } else { value }
}

/// `1`, `true`, `on`, `yes` in any case
pub fn boolean(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// String-keyed raw input: form body, query string or server variables
#[derive(Clone, Debug, Default)]
pub struct Input(HashMap<String, String>);

impl Input {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    pub fn raw(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Sanitized text, empty when missing
    pub fn text(&self, name: &str) -> String {
        self.raw(name).map(text).unwrap_or_default()
    }

    /// Sanitized text, `default` when missing
    pub fn text_or(&self, name: &str, default: &str) -> String {
        self.raw(name).map_or_else(|| default.to_string(), text)
    }

    pub fn currency(&self, name: &str) -> String {
        self.raw(name).map_or_else(|| DEFAULT_CURRENCY.to_string(), currency)
    }

    pub fn integer(&self, name: &str) -> i64 {
        self.raw(name).map_or(0, integer)
    }

    pub fn boolean(&self, name: &str) -> bool {
        self.raw(name).is_some_and(boolean)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Input {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for Input {
    fn from(values: HashMap<String, String>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_strips_markup_and_whitespace() {
        assert_eq!(text("  Consulting\n\t hour  "), "Consulting hour");
        assert_eq!(text("<b>Bold</b> offer"), "Bold offer");
        assert_eq!(text("a<script>alert(1)</script>b"), "ab");
        assert_eq!(text("100%20off"), "100off");
        assert_eq!(text("canceled "), "canceled");
        assert_eq!(text("Deal < 5 dollars"), "Deal < 5 dollars");
        assert_eq!(text("1 <2 and 3>2"), "1 <2 and 3>2");
        assert_eq!(text("Offer <i>now"), "Offer now");
        assert_eq!(text("Cut <a href=x"), "Cut");
    }

    #[test]
    fn test_currency_sanitization() {
        assert_eq!(currency("US-D1"), "usd");
        assert_eq!(currency("EUR"), "eur");
        assert_eq!(currency(" a e d "), "aed");
        assert_eq!(currency("123"), DEFAULT_CURRENCY);
    }

    #[test]
    fn test_currency_is_idempotent() {
        for raw in ["US-D1", "eur", "Gbp ", "", "<x>", "ÄUD"] {
            let once = currency(raw);
            assert_eq!(currency(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(integer("500"), 500);
        assert_eq!(integer(" 42 "), 42);
        assert_eq!(integer("12abc"), 12);
        assert_eq!(integer("-3"), -3);
        assert_eq!(integer("abc"), 0);
        assert_eq!(integer(""), 0);
        assert_eq!(integer("99999999999999999999999"), 0);
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(boolean("true"));
        assert!(boolean("TRUE"));
        assert!(boolean("1"));
        assert!(boolean("on"));
        assert!(boolean("yes"));
        assert!(!boolean("false"));
        assert!(!boolean(""));
        assert!(!boolean("nope"));
    }

    #[test]
    fn test_input_defaults_are_independent() {
        let input: Input = [("amount", "oops"), ("currency", "E-U-R")].into_iter().collect();
        assert_eq!(input.integer("amount"), 0);
        assert_eq!(input.currency("currency"), "eur");
        assert_eq!(input.text_or("description", DEFAULT_DESCRIPTION), "Custom Payment");
        assert_eq!(input.text_or("mode", DEFAULT_MODE), "payment");
        assert_eq!(input.text("price"), "");
        assert!(!input.boolean("custom_amount"));
    }
}
