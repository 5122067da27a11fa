//! Hedging backtest engine: bar-by-bar simulator and supporting state.
//!
//! The simulator consumes a bar series plus one signal per bar and runs the
//! three-phase loop (close check, open check, equity record). Open positions
//! live in an index-arena ledger; margin is tracked by a separate controller
//! whose admission rule gates every open.

pub mod config;
pub mod ledger;
pub mod margin;
pub mod simulator;
pub mod state;

pub use config::{ConfigError, SimulationConfig};
pub use ledger::PositionLedger;
pub use margin::MarginController;
pub use simulator::{resolve_exit, simulate, BarSimulator, SimulationError};
pub use state::{OpenRejections, RejectReason, SimulationResult};
