//! Trace-level optimizations.
//!
//! Every pass rewrites `Machine::positions` in place. The route-grouping
//! pass validates its structural assumptions first and reports instead of
//! touching the trace when they do not hold; the others are total.

mod drill;
mod floating_z;
mod lift;
mod route;
mod vector;

pub use route::OptimizeError;
