//! Position snapshot with unrealized P&L.

use serde::{Deserialize, Serialize};

/// One held position as reported by the brokerage, priced at the latest quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Net quantity: long minus short.
    pub quantity: f64,
    pub average_price: f64,
    /// Last trade price (or mark); 0.0 when no quote was available.
    pub current_price: f64,
}

impl PositionSnapshot {
    pub fn cost_basis(&self) -> f64 {
        self.average_price * self.quantity.abs()
    }

    pub fn market_value(&self) -> f64 {
        self.current_price * self.quantity.abs()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    /// P&L as a percentage of cost basis. Zero cost basis yields 0.0.
    pub fn pnl_percent(&self) -> f64 {
        let basis = self.cost_basis();
        if basis > 0.0 {
            self.unrealized_pnl() / basis * 100.0
        } else {
            0.0
        }
    }
}
