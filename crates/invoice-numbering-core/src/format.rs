//! Invoice number templates.
//!
//! A template is free text with placeholders:
//!
//! - `{YYYY}`: four-digit year
//! - `{MM}`: two-digit month
//! - `{SEQ}`: the sequence as a raw integer
//! - `{SEQ:n}`: the sequence zero-padded to `n` digits
//!
//! Anything else inside braces is copied through literally. [`render`] never
//! fails; [`NumberFormat::parse`] applies the stricter rules a template must
//! pass before it may be configured for a scope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::period::Period;

/// Template used when nothing else is configured.
pub const DEFAULT_TEMPLATE: &str = "INV-{YYYY}-{SEQ:4}";

/// Longest template accepted for configuration.
pub const MAX_TEMPLATE_LEN: usize = 128;

/// Widest sequence padding; `u64::MAX` has 20 digits.
pub const MAX_SEQUENCE_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year,
    Month,
    Sequence { width: Option<usize> },
}

impl Token {
    fn parse(inner: &str) -> Option<Self> {
        match inner {
            "YYYY" => Some(Self::Year),
            "MM" => Some(Self::Month),
            "SEQ" => Some(Self::Sequence { width: None }),
            _ => {
                let width = inner.strip_prefix("SEQ:")?;
                if width.is_empty() || !width.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let width: usize = width.parse().ok()?;
                (1..=MAX_SEQUENCE_WIDTH)
                    .contains(&width)
                    .then_some(Self::Sequence { width: Some(width) })
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Token(Token),
    /// Brace-delimited text that is not a known placeholder.
    Unknown(&'a str),
}

/// Split a template into literal runs and placeholders.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push(Segment::Literal(tail));
            return out;
        };
        let inner = &tail[1..close];
        if let Some(token) = Token::parse(inner) {
            out.push(Segment::Token(token));
            rest = &tail[close + 1..];
        } else if inner.contains('{') {
            // "{{SEQ}" keeps the first brace and retries from the second.
            out.push(Segment::Literal("{"));
            rest = &tail[1..];
        } else {
            out.push(Segment::Unknown(&tail[..=close]));
            rest = &tail[close + 1..];
        }
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

/// Render a template for a period and sequence.
///
/// Pure and deterministic. Unknown placeholders are kept verbatim and a
/// sequence wider than its padding is never truncated.
#[must_use]
pub fn render(template: &str, year: i32, month: u32, sequence: u64) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) | Segment::Unknown(text) => out.push_str(text),
            Segment::Token(Token::Year) => out.push_str(&format!("{year:04}")),
            Segment::Token(Token::Month) => out.push_str(&format!("{month:02}")),
            Segment::Token(Token::Sequence { width: None }) => {
                out.push_str(&sequence.to_string());
            }
            Segment::Token(Token::Sequence { width: Some(width) }) => {
                out.push_str(&format!("{sequence:0width$}"));
            }
        }
    }
    out
}

/// A template that has passed configuration rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NumberFormat(String);

impl NumberFormat {
    /// Validate a template.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTemplate` if the template is empty, starts
    /// or ends with whitespace, is longer than `MAX_TEMPLATE_LEN`, has no
    /// sequence placeholder, or has a `{SEQ:n}` whose width is not an integer
    /// in `1..=MAX_SEQUENCE_WIDTH`.
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let reject = |reason: &str| CoreError::InvalidTemplate {
            template: template.clone(),
            reason: reason.to_string(),
        };

        if template.trim().is_empty() {
            return Err(reject("template is empty"));
        }
        // Numbers are looked up by their trimmed text
        if template.trim() != template {
            return Err(reject("template has leading or trailing whitespace"));
        }
        if template.len() > MAX_TEMPLATE_LEN {
            return Err(reject("template is too long"));
        }

        let mut has_sequence = false;
        for segment in segments(&template) {
            match segment {
                Segment::Token(Token::Sequence { .. }) => has_sequence = true,
                Segment::Unknown(text) if text.starts_with("{SEQ:") => {
                    return Err(reject("sequence width must be an integer from 1 to 20"));
                }
                _ => {}
            }
        }
        if !has_sequence {
            return Err(reject("template has no {SEQ} placeholder"));
        }

        Ok(Self(template))
    }

    /// The default `INV-{YYYY}-{SEQ:4}` format.
    #[must_use]
    pub fn default_format() -> Self {
        Self(DEFAULT_TEMPLATE.to_string())
    }

    /// The raw template.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render a number in this format.
    #[must_use]
    pub fn render(&self, period: Period, sequence: u64) -> String {
        render(&self.0, period.year(), period.month(), sequence)
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NumberFormat {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<NumberFormat> for String {
    fn from(format: NumberFormat) -> Self {
        format.0
    }
}
