//! Alert Closure Scheduler
//!
//! Periodically sweeps open alerts that have participations and applies
//! the auto-close policy to each one.

mod sweeper;

pub use sweeper::{ClosureSweeper, SweepConfig, SweepReport, SweepStore};
