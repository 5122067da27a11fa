//! Margin controller: aggregate used-margin bookkeeping and admission.

/// Float residue below this is treated as fully released margin.
const MARGIN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct MarginController {
    used: f64,
}

impl MarginController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    /// Margin a new position needs at `price`.
    pub fn required(price: f64, position_size: f64, contract_size: f64, leverage: f64) -> f64 {
        price * position_size * contract_size / leverage
    }

    /// Admission rule: used + required must stay within `balance * limit_fraction`.
    ///
    /// Evaluated against realized balance; floating pnl of open positions is
    /// deliberately excluded.
    pub fn admits(&self, required: f64, balance: f64, limit_fraction: f64) -> bool {
        self.used + required <= balance * limit_fraction
    }

    pub fn reserve(&mut self, amount: f64) {
        self.used += amount;
    }

    pub fn release(&mut self, amount: f64) {
        self.used -= amount;
        debug_assert!(
            self.used >= -MARGIN_EPSILON * amount.abs().max(1.0),
            "used margin went negative: {}",
            self.used
        );
        if self.used.abs() < MARGIN_EPSILON * amount.abs().max(1.0) {
            self.used = 0.0;
        }
    }
}
