//! Closure Routes

use alerting::{auto_close, AlertKey, ClosureOutcome};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use closure_scheduler::SweepReport;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Evaluate one alert now and close it if participants outvoted it.
///
/// A close is only reported once the snapshot has been written; a failed
/// write is a storage error.
pub async fn auto_close_alert(
    State(state): State<Arc<AppState>>,
    Path((id_alert, user_id)): Path<(i32, i32)>,
) -> Result<Json<ClosureOutcome>, ApiError> {
    let key = AlertKey::new(id_alert, user_id);
    let alert = state.repository.get_alert(key)?;

    let outcome = auto_close(state.repository.as_ref(), &alert, Utc::now())?;
    debug!("On-demand auto-close for {}: closed={}", key, outcome.closed);

    if outcome.closed {
        state.repository.persist().await?;
    }

    Ok(Json(outcome))
}

/// Report of the most recent sweep, `null` before the first one
pub async fn get_last_sweep(State(state): State<Arc<AppState>>) -> Json<Option<SweepReport>> {
    Json(state.last_sweep())
}
