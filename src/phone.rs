use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref TEXT_NUMBER: Regex = Regex::new(r"\+?\d{10,15}").unwrap();
    static ref JID_NUMBER: Regex = Regex::new(r"(\d{10,15})@").unwrap();
}

/// A phone number normalized to its bare digits.
///
/// Numbers arrive in many shapes: `+91 98765-43210`, `919876543210@c.us`,
/// `98765 43210`. All comparisons go through the normalized digit string so
/// the rest of the engine never has to care about separators or the leading
/// `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strip every non-digit character from the input.
    ///
    /// Malformed input normalizes to an empty or short digit string, which
    /// will simply never match a real roster row. That is intentional: a
    /// garbage verification target is a non-member, not an error.
    pub fn normalize(raw: &str) -> Self {
        PhoneNumber(raw.chars().filter(|c| c.is_ascii_digit()).collect())
    }

    pub fn as_digits(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same-subscriber comparison: exact match, or matching last 10 digits.
    ///
    /// The suffix rule covers numbers recorded with and without a country
    /// code (`919876543210` vs `9876543210`).
    pub fn matches(&self, other: &PhoneNumber) -> bool {
        if self.0.is_empty() || other.0.is_empty() {
            return false;
        }
        if self.0 == other.0 {
            return true;
        }
        last_10(&self.0) == last_10(&other.0)
    }

    /// Extract a phone number from free-form message text.
    pub fn from_text(text: &str) -> Option<Self> {
        TEXT_NUMBER.find(text).map(|m| Self::normalize(m.as_str()))
    }

    /// Extract a phone number from a transport identifier such as
    /// `919876543210@c.us`.
    pub fn from_jid(jid: &str) -> Option<Self> {
        JID_NUMBER
            .captures(jid)
            .map(|c| Self::normalize(&c[1]))
    }
}

fn last_10(digits: &str) -> &str {
    let start = digits.len().saturating_sub(10);
    &digits[start..]
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_everything_but_digits() {
        for raw in ["+91 98765-43210", "(919) 876 543210", "abc919x876543210", "919876543210"] {
            let n = PhoneNumber::normalize(raw);
            assert!(n.as_digits().chars().all(|c| c.is_ascii_digit()), "{raw}");
        }
        assert_eq!(PhoneNumber::normalize("+91 98765-43210").as_digits(), "919876543210");
        assert_eq!(PhoneNumber::normalize("no digits here").as_digits(), "");
    }

    #[test]
    fn matches_with_and_without_country_code() {
        let with_cc = PhoneNumber::normalize("919876543210");
        let without_cc = PhoneNumber::normalize("9876543210");
        assert!(with_cc.matches(&without_cc));
        assert!(without_cc.matches(&with_cc));
    }

    #[test]
    fn matches_exact() {
        let a = PhoneNumber::normalize("919876543210");
        let b = PhoneNumber::normalize("+919876543210");
        assert!(a.matches(&b));
    }

    #[test]
    fn different_subscribers_do_not_match() {
        let a = PhoneNumber::normalize("919876543210");
        let b = PhoneNumber::normalize("919876543211");
        assert!(!a.matches(&b));
    }

    #[test]
    fn empty_never_matches() {
        let empty = PhoneNumber::normalize("");
        assert!(!empty.matches(&empty));
        assert!(!empty.matches(&PhoneNumber::normalize("919876543210")));
    }

    #[test]
    fn extract_from_text_and_jid() {
        assert_eq!(
            PhoneNumber::from_text("please verify +919876543210 thanks").unwrap().as_digits(),
            "919876543210"
        );
        assert_eq!(
            PhoneNumber::from_jid("919876543210@c.us").unwrap().as_digits(),
            "919876543210"
        );
        assert!(PhoneNumber::from_jid("not-a-jid").is_none());
    }
}
