//! Ticker symbol validation.
//!
//! Symbols arrive from the query string of the upgrade request. They are
//! trimmed and upper-cased so that `aapl` and `AAPL` share one subscription
//! key, and therefore one upstream fetch per tick.

use thiserror::Error;

/// Longest symbol accepted from a client.
pub const MAX_SYMBOL_LEN: usize = 32;

/// Why a requested symbol was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// No symbol, or only whitespace.
    #[error("missing symbol")]
    Missing,

    /// Longer than `MAX_SYMBOL_LEN`.
    #[error("symbol is {0} characters long, the limit is {MAX_SYMBOL_LEN}")]
    TooLong(usize),

    /// Contains a character that never appears in a ticker.
    #[error("symbol contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Normalizes a requested symbol.
///
/// Accepted characters are ASCII alphanumerics plus `.`, `-`, `^` and `=`,
/// which covers share classes (`BRK.B`), indices (`^GSPC`) and FX/futures
/// tickers (`EURUSD=X`, `ES=F`).
pub fn normalize_symbol(raw: &str) -> Result<String, SymbolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SymbolError::Missing);
    }

    let len = trimmed.chars().count();
    if len > MAX_SYMBOL_LEN {
        return Err(SymbolError::TooLong(len));
    }

    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
    {
        return Err(SymbolError::InvalidChar(bad));
    }

    Ok(trimmed.to_ascii_uppercase())
}
