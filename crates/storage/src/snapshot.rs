//! JSON snapshot boundary
//!
//! Alerts enter and leave the process here. Records are validated on the
//! way in so the rest of the crate can trust composite keys.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use alerting::Alert;
use tokio::fs;
use tracing::{debug, info};

use crate::StorageError;

/// Fail early when the directory a snapshot would be written to is missing
pub(crate) async fn check_parent_dir(path: &Path) -> Result<(), StorageError> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };

    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StorageError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("snapshot directory {} is not a directory", dir.display()),
        ))),
        Err(e) => Err(StorageError::Io(io::Error::new(
            e.kind(),
            format!("snapshot directory {}: {}", dir.display(), e),
        ))),
    }
}

/// Read and validate a snapshot file
pub(crate) async fn read_snapshot(path: &Path) -> Result<Vec<Alert>, StorageError> {
    let raw = fs::read_to_string(path).await?;
    let alerts: Vec<Alert> = serde_json::from_str(&raw)?;
    validate(&alerts)?;

    info!("Loaded {} alerts from {}", alerts.len(), path.display());
    Ok(alerts)
}

/// Write alerts to `path`, replacing the previous snapshot atomically
pub(crate) async fn write_snapshot(path: &Path, alerts: &[Alert]) -> Result<usize, StorageError> {
    let json = serde_json::to_vec_pretty(alerts)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;

    debug!("Wrote {} alerts to {}", alerts.len(), path.display());
    Ok(alerts.len())
}

/// Check composite keys across a batch of alerts
pub(crate) fn validate(alerts: &[Alert]) -> Result<(), StorageError> {
    let mut seen = HashSet::with_capacity(alerts.len());

    for alert in alerts {
        if !seen.insert(alert.key()) {
            return Err(StorageError::Validation(format!(
                "duplicate alert {}",
                alert.key()
            )));
        }
        validate_alert(alert)?;
    }

    Ok(())
}

/// Check that every vote on `alert` points back at it and is unique
pub(crate) fn validate_alert(alert: &Alert) -> Result<(), StorageError> {
    let key = alert.key();
    let mut votes = HashSet::with_capacity(alert.participation.len());

    for vote in &alert.participation {
        if vote.alert_key() != key {
            return Err(StorageError::Validation(format!(
                "participation {}/{} references alert {} but is attached to {}",
                vote.id_participation,
                vote.user_id,
                vote.alert_key(),
                key
            )));
        }
        if !votes.insert((vote.id_participation, vote.user_id)) {
            return Err(StorageError::Validation(format!(
                "duplicate participation {}/{} on alert {}",
                vote.id_participation, vote.user_id, key
            )));
        }
    }

    Ok(())
}
