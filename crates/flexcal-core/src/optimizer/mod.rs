//! Day optimizer.
//!
//! Re-packs a day's flexible events so that as few pairs as possible
//! overlap:
//! - [`ModelBuilder`] discretizes the day and enumerates candidate starts
//! - [`PlacementSolver`] picks one candidate per event ([`IlpSolver`] by default)
//! - [`DayOptimizer`] reads the day, solves, and writes back what moved

mod day;
mod model;
mod solver;

pub use day::{DayOptimizer, OptimizationReport, Relocation};
pub use model::{ModelBuilder, ModelItem, OverlapModel, PairLink};
pub use solver::{Assignment, IlpSolver, PlacementSolver};
