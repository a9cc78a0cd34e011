//! Property-based tests

pub mod conflict;
pub mod convergence;
pub mod ordering;
pub mod ot_tp1;
