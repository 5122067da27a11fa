use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Realized balance after a bar has been fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub balance: f64,
}

/// Balances of an equity curve, in bar order.
pub fn balances(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.balance).collect()
}
