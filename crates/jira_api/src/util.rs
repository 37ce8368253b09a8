//! Date conversion and URL encoding helpers.
//!
//! Repositories exchange timestamps as UTC epoch seconds. Query strings use
//! form encoding: space becomes `+` and only alphanumerics and `.-*_` are
//! left unescaped.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

pub fn parse_date(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

pub fn parse_date_str(seconds: &str) -> Option<DateTime<Utc>> {
    seconds.trim().parse::<i64>().ok().and_then(parse_date)
}

pub fn to_epoch_seconds(date: &DateTime<Utc>) -> i64 {
    date.timestamp()
}

/// Form-encodes `value` as UTF-8.
pub fn form_encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E")
}

/// Reverses [`form_encode`]; malformed input is returned unchanged.
pub fn form_decode(value: &str) -> String {
    let plus_decoded = value.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(Cow::Borrowed(decoded)) => decoded.to_string(),
        Ok(Cow::Owned(decoded)) => decoded,
        Err(_) => value.to_string(),
    }
}

/// Encodes a path segment such as an attachment file name.
pub fn encode_url(value: &str) -> String {
    form_encode(value).replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_url_escapes_spaces_and_reserved_characters() {
        assert_eq!(encode_url("sp ace "), "sp%20ace%20");
        assert_eq!(encode_url("++"), "%2B%2B");
        assert_eq!(encode_url("%20"), "%2520");
        assert_eq!(encode_url("/slash"), "%2Fslash");
    }

    #[test]
    fn form_encoding_matches_form_rules() {
        assert_eq!(form_encode("a b"), "a+b");
        assert_eq!(form_encode("~äöü"), "%7E%C3%A4%C3%B6%C3%BC");
        assert_eq!(form_encode("a*b.c-d_e"), "a*b.c-d_e");
        assert_eq!(form_decode("%7E%C3%A4%C3%B6%C3%BC"), "~äöü");
        assert_eq!(form_decode("a+b"), "a b");
        assert_eq!(form_decode("%2B"), "+");
    }

    #[test]
    fn dates_are_epoch_seconds() {
        let date = parse_date(1_200_000_000).expect("valid date");
        assert_eq!(date.timestamp_millis(), 1_200_000_000_000);
        assert_eq!(to_epoch_seconds(&date), 1_200_000_000);
        assert_eq!(parse_date_str("0").map(|d| d.timestamp()), Some(0));
        assert!(parse_date_str("yesterday").is_none());
    }
}
