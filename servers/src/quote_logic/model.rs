use serde::Deserialize;

/// Query string of the `/stock` upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockQuery {
    pub symbol: Option<String>,
}

pub const MISSING_SYMBOL: &str = "Missing symbol query parameter";
pub const INVALID_SYMBOL: &str = "Invalid symbol query parameter";
