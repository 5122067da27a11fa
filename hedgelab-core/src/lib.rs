//! HedgeLab Core: domain types and the hedging bar simulator.
//!
//! This crate contains the path-dependent part of the pipeline:
//! - Domain types (bars, signals, positions, trades, equity points)
//! - Bar simulator with take-profit-first exit resolution
//! - Position ledger (index arena) and margin controller
//! - Simulation configuration and outputs

pub mod domain;
pub mod engine;

pub use domain::{Bar, Direction, EquityPoint, ExitReason, Position, Side, Signal, Trade};
pub use engine::{simulate, BarSimulator, SimulationConfig, SimulationError, SimulationResult};
