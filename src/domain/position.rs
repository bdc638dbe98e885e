//! Held positions. The store aggregates them into sector exposure.

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub avg_price: f64,
    /// `None` belongs to the empty-string sector.
    pub sector: Option<String>,
}
