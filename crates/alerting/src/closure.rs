//! Auto-close: apply the closure policy and persist the result

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::model::{Alert, AlertKey, AlertStatus};
use crate::policy::{evaluate, Decision};

/// Errors from the storage collaborator when writing a status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusWriteError {
    #[error("Alert {0} not found")]
    NotFound(AlertKey),
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Errors surfaced by [`auto_close`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// The alert disappeared before its status could be written
    #[error("Alert {0} no longer exists")]
    NotFound(AlertKey),
    #[error("Failed to persist alert status: {0}")]
    Storage(String),
}

impl From<StatusWriteError> for ClosureError {
    fn from(err: StatusWriteError) -> Self {
        match err {
            StatusWriteError::NotFound(key) => ClosureError::NotFound(key),
            StatusWriteError::Storage(msg) => ClosureError::Storage(msg),
        }
    }
}

/// Storage capability used to persist a status transition.
///
/// Writes must be idempotent: setting the same status twice is harmless.
pub trait AlertStatusStore {
    fn update_alert_status(
        &self,
        key: AlertKey,
        status: AlertStatus,
    ) -> Result<Alert, StatusWriteError>;
}

/// Result of one auto-close attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureOutcome {
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(skip)]
    pub decision: Decision,
}

impl ClosureOutcome {
    fn kept_open(decision: Decision) -> Self {
        Self {
            closed: false,
            reason: decision.reason().map(str::to_string),
            alert: None,
            decision,
        }
    }

    fn closed(decision: Decision, alert: Alert) -> Self {
        Self {
            closed: true,
            reason: None,
            alert: Some(alert),
            decision,
        }
    }
}

/// Evaluate `alert` at `now` and close it through `store` when the policy says so.
///
/// Exactly one status write is issued on a close decision; none otherwise.
/// Storage errors are returned as-is, without retry.
pub fn auto_close<S>(
    store: &S,
    alert: &Alert,
    now: DateTime<Utc>,
) -> Result<ClosureOutcome, ClosureError>
where
    S: AlertStatusStore + ?Sized,
{
    let decision = evaluate(alert, now);

    if !decision.should_close() {
        return Ok(ClosureOutcome::kept_open(decision));
    }

    let updated = store.update_alert_status(alert.key(), AlertStatus::Closed)?;
    info!("Alert {} closed by vote ({:?})", alert.key(), decision);

    Ok(ClosureOutcome::closed(decision, updated))
}
