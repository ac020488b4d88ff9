//! Decoding of the compact significance codes attached to every model.
//!
//! A code is an optional leading `*`, flagging a negative leading coefficient, followed by two
//! `+`/`-` characters.  The first reports whether the added polynomial term improved the fit
//! significantly at α=0.05, the second does the same at α=0.01.

use std::fmt;
use std::str::FromStr;

use crate::error::CodeParseError;

const NEGATIVE_LEADING: &str = "leading coefficient is negative";
const SIGNIFICANT_05: &str = "significant at α=0.05";
const NOT_BETTER_05: &str = "not better at α=0.05";
const SIGNIFICANT_01: &str = "significant at α=0.01";
const NOT_BETTER_01: &str = "not better at α=0.01";

/// Turns a significance code into a human-readable sentence.
///
/// Input that does not match `[*]?[+-][+-]` is decoded best-effort: any character other than `+`,
/// including a missing one, reads as "not better".
pub fn explain(code: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    let rest = match code.strip_prefix('*') {
        Some(rest) => {
            parts.push(NEGATIVE_LEADING);
            rest
        }
        None => code,
    };

    let mut flags = rest.chars();
    parts.push(if flags.next() == Some('+') {
        SIGNIFICANT_05
    } else {
        NOT_BETTER_05
    });
    parts.push(if flags.next() == Some('+') {
        SIGNIFICANT_01
    } else {
        NOT_BETTER_01
    });

    parts.join(", ")
}

/// Strictly parsed form of a significance code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SignificanceCode {
    /// The leading coefficient of the model is negative.
    pub negative_leading: bool,
    /// The added term is significant at α=0.05.
    pub at_05: bool,
    /// The added term is significant at α=0.01.
    pub at_01: bool,
}

impl SignificanceCode {
    /// Returns the same sentence [`explain`] produces for the compact form.
    pub fn explain(&self) -> String {
        explain(&self.to_string())
    }
}

fn flag(ch: char) -> Option<bool> {
    match ch {
        '+' => Some(true),
        '-' => Some(false),
        _ => None,
    }
}

impl FromStr for SignificanceCode {
    type Err = CodeParseError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let invalid = || CodeParseError(code.to_owned());
        let (negative_leading, rest) = match code.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, code),
        };

        let mut chars = rest.chars();
        let (Some(first), Some(second), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(invalid());
        };

        Ok(Self {
            negative_leading,
            at_05: flag(first).ok_or_else(invalid)?,
            at_01: flag(second).ok_or_else(invalid)?,
        })
    }
}

impl fmt::Display for SignificanceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = |set: bool| if set { '+' } else { '-' };
        if self.negative_leading {
            f.write_str("*")?;
        }
        write!(f, "{}{}", sign(self.at_05), sign(self.at_01))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explains_both_significant() {
        assert_eq!(
            explain("++"),
            "significant at α=0.05, significant at α=0.01"
        );
    }

    #[test]
    fn explains_mixed() {
        assert_eq!(
            explain("+-"),
            "significant at α=0.05, not better at α=0.01"
        );
    }

    #[test]
    fn explains_negative_leading() {
        assert_eq!(
            explain("*-+"),
            "leading coefficient is negative, not better at α=0.05, significant at α=0.01"
        );
    }

    #[test]
    fn malformed_codes_decode_best_effort() {
        assert_eq!(explain(""), "not better at α=0.05, not better at α=0.01");
        assert_eq!(
            explain("*+"),
            "leading coefficient is negative, significant at α=0.05, not better at α=0.01"
        );
    }

    #[test]
    fn parses_valid_codes() {
        let code: SignificanceCode = "*+-".parse().unwrap();
        assert!(code.negative_leading);
        assert!(code.at_05);
        assert!(!code.at_01);
        assert_eq!(code.to_string(), "*+-");
    }

    #[test]
    fn rejects_malformed_codes() {
        for code in ["", "+", "+++", "**+-", "+x", "-+*", " ++"] {
            assert!(code.parse::<SignificanceCode>().is_err(), "{code:?}");
        }
    }

    #[test]
    fn parsed_code_explains_like_the_string_form() {
        for code in ["++", "+-", "-+", "--", "*++", "*+-", "*-+", "*--"] {
            let parsed: SignificanceCode = code.parse().unwrap();
            assert_eq!(parsed.explain(), explain(code));
        }
    }
}
