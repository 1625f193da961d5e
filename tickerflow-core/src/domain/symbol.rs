//! Symbol: a validated ticker symbol.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest ticker the pipeline accepts.
pub const MAX_SYMBOL_LEN: usize = 5;

/// Reasons a string is not a ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol is empty")]
    Empty,

    #[error("symbol has {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("invalid character '{ch}' at position {index}")]
    InvalidChar { ch: char, index: usize },
}

/// Uppercase alphabetic ticker, 1 to 5 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, SymbolError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        if let Some((index, ch)) = normalized
            .chars()
            .enumerate()
            .find(|(_, ch)| !ch.is_ascii_alphabetic())
        {
            return Err(SymbolError::InvalidChar { ch, index });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes() {
        let parsed = Symbol::parse(" aapl ").unwrap();
        assert_eq!(parsed.as_str(), "AAPL");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Symbol::parse("   "), Err(SymbolError::Empty));
    }

    #[test]
    fn rejects_too_long() {
        let err = Symbol::parse("GOOGLE").unwrap_err();
        assert!(matches!(err, SymbolError::TooLong { len: 6, max: 5 }));
    }

    #[test]
    fn rejects_digits_and_punctuation() {
        assert!(matches!(
            Symbol::parse("BRK.B"),
            Err(SymbolError::InvalidChar { ch: '.', index: 3 })
        ));
        assert!(matches!(
            Symbol::parse("A1"),
            Err(SymbolError::InvalidChar { ch: '1', index: 1 })
        ));
    }

    #[test]
    fn serde_goes_through_parse() {
        let sym: Symbol = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(sym.as_str(), "MSFT");
        assert!(serde_json::from_str::<Symbol>("\"TOOLONG\"").is_err());
    }
}
