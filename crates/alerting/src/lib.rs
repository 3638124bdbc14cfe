//! Alerting
//!
//! Citizen alert model and the vote-based auto-close policy.

mod closure;
mod model;
mod policy;

pub use closure::{auto_close, AlertStatusStore, ClosureError, ClosureOutcome, StatusWriteError};
pub use model::{Alert, AlertKey, AlertStatus, Participation, VoteResponse};
pub use policy::{
    evaluate, Decision, Tally, MIN_AGE_MINUTES, REASON_INSUFFICIENT_NEGATIVES, REASON_TOO_EARLY,
};
