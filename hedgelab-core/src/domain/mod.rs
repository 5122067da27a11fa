//! Domain types for HedgeLab

pub mod bar;
pub mod equity;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use equity::EquityPoint;
pub use position::{Position, PositionId, Side};
pub use signal::{Direction, Signal};
pub use trade::{ExitReason, Trade};
