//! Background work that outlives its request

pub mod tracker;

pub use tracker::{AbortSignal, Handoff, JobTracker};
