//! Repository Implementation

use crate::snapshot;
use crate::StorageError;
use alerting::{Alert, AlertKey, AlertStatus, AlertStatusStore, Participation, StatusWriteError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Repository for alerts and their participations
pub struct Repository {
    /// Alerts by composite key
    alerts: Mutex<BTreeMap<AlertKey, Alert>>,
    /// Snapshot file written by [`Repository::persist`]
    snapshot_path: Option<PathBuf>,
}

impl Repository {
    /// Create an empty in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory alert repository");
        Self {
            alerts: Mutex::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// Open a repository backed by a JSON snapshot.
    ///
    /// A missing file yields an empty repository; it is created on the
    /// first [`persist`](Self::persist). The directory holding it must
    /// already exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        snapshot::check_parent_dir(path).await?;

        let alerts = if tokio::fs::try_exists(path).await? {
            snapshot::read_snapshot(path).await?
        } else {
            info!("Snapshot {} not found, starting empty", path.display());
            Vec::new()
        };

        let mut repo = Self::from_alerts(alerts)?;
        repo.snapshot_path = Some(path.to_path_buf());
        Ok(repo)
    }

    /// Build a repository from already-decoded alerts
    pub fn from_alerts(alerts: Vec<Alert>) -> Result<Self, StorageError> {
        snapshot::validate(&alerts)?;

        let map = alerts.into_iter().map(|a| (a.key(), a)).collect();
        Ok(Self {
            alerts: Mutex::new(map),
            snapshot_path: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<AlertKey, Alert>>, StorageError> {
        self.alerts
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Insert or replace an alert
    pub fn insert_alert(&self, alert: Alert) -> Result<(), StorageError> {
        snapshot::validate_alert(&alert)?;

        let key = alert.key();
        self.lock()?.insert(key, alert);
        debug!("Stored alert {}", key);
        Ok(())
    }

    /// Get an alert with its participations
    pub fn get_alert(&self, key: AlertKey) -> Result<Alert, StorageError> {
        self.lock()?
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound(key))
    }

    /// Attach a vote to the alert it references
    pub fn add_participation(&self, participation: Participation) -> Result<(), StorageError> {
        let key = participation.alert_key();
        let mut alerts = self.lock()?;
        let alert = alerts.get_mut(&key).ok_or(StorageError::NotFound(key))?;

        let duplicate = alert.participation.iter().any(|p| {
            p.id_participation == participation.id_participation
                && p.user_id == participation.user_id
        });
        if duplicate {
            return Err(StorageError::Validation(format!(
                "duplicate participation {}/{} on alert {}",
                participation.id_participation, participation.user_id, key
            )));
        }

        alert.participation.push(participation);
        debug!("Alert {} now has {} participations", key, alert.participation.len());
        Ok(())
    }

    /// Open alerts with at least one participation
    pub fn closure_candidates(&self) -> Result<Vec<Alert>, StorageError> {
        Ok(self
            .lock()?
            .values()
            .filter(|a| a.is_open() && !a.participation.is_empty())
            .cloned()
            .collect())
    }

    /// Get total alert count
    pub fn alert_count(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Write all alerts back to the snapshot file.
    ///
    /// Returns the number of alerts written, or `None` when the repository
    /// has no snapshot file. The lock is released before any file I/O.
    pub async fn persist(&self) -> Result<Option<usize>, StorageError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(None);
        };

        let alerts: Vec<Alert> = self.lock()?.values().cloned().collect();
        let written = snapshot::write_snapshot(path, &alerts).await?;
        Ok(Some(written))
    }

    fn set_status(&self, key: AlertKey, status: AlertStatus) -> Result<Alert, StorageError> {
        let mut alerts = self.lock()?;
        let alert = alerts.get_mut(&key).ok_or(StorageError::NotFound(key))?;

        if alert.status != status {
            info!("Alert {} status {} -> {}", key, alert.status.as_str(), status.as_str());
        }
        alert.status = status;
        Ok(alert.clone())
    }
}

impl AlertStatusStore for Repository {
    fn update_alert_status(
        &self,
        key: AlertKey,
        status: AlertStatus,
    ) -> Result<Alert, StatusWriteError> {
        Ok(self.set_status(key, status)?)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{auto_close, VoteResponse};
    use chrono::{Duration, Utc};

    fn alert(id: i32, user: i32, age_minutes: i64) -> Alert {
        let mut alert = Alert::new(
            AlertKey::new(id, user),
            Utc::now() - Duration::minutes(age_minutes),
        );
        alert.title = "Nid de poule".to_string();
        alert.intensity = "jaune".to_string();
        alert
    }

    fn vote(id: i32, user: i32, key: AlertKey, response: &str) -> Participation {
        Participation::new(id, user, key, Some(response.into()))
    }

    #[test]
    fn test_alert_insert_and_retrieve() {
        let repo = Repository::new();
        repo.insert_alert(alert(1, 10, 5)).unwrap();

        let stored = repo.get_alert(AlertKey::new(1, 10)).unwrap();
        assert_eq!(stored.title, "Nid de poule");
        assert_eq!(repo.alert_count(), 1);

        assert!(matches!(
            repo.get_alert(AlertKey::new(1, 11)),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_participation_requires_alert() {
        let repo = Repository::new();
        let key = AlertKey::new(1, 10);

        let err = repo.add_participation(vote(1, 20, key, "non")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(k) if k == key));

        repo.insert_alert(alert(1, 10, 5)).unwrap();
        repo.add_participation(vote(1, 20, key, "non")).unwrap();
        assert!(matches!(
            repo.add_participation(vote(1, 20, key, "oui")),
            Err(StorageError::Validation(_))
        ));
        assert_eq!(repo.get_alert(key).unwrap().participation.len(), 1);
    }

    #[test]
    fn test_closure_candidates() {
        let repo = Repository::new();
        let voted = AlertKey::new(1, 10);
        let closed = AlertKey::new(2, 10);

        repo.insert_alert(alert(1, 10, 30)).unwrap();
        repo.insert_alert(alert(2, 10, 30)).unwrap();
        repo.insert_alert(alert(3, 10, 30)).unwrap();
        repo.add_participation(vote(1, 20, voted, "non")).unwrap();
        repo.add_participation(vote(1, 20, closed, "non")).unwrap();
        repo.update_alert_status(closed, AlertStatus::Closed).unwrap();

        let candidates = repo.closure_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key(), voted);
    }

    #[test]
    fn test_status_update_is_idempotent() {
        let repo = Repository::new();
        let key = AlertKey::new(1, 10);
        repo.insert_alert(alert(1, 10, 30)).unwrap();

        let first = repo.update_alert_status(key, AlertStatus::Closed).unwrap();
        let second = repo.update_alert_status(key, AlertStatus::Closed).unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.get_alert(key).unwrap().status, AlertStatus::Closed);
    }

    #[test]
    fn test_status_update_missing_alert() {
        let repo = Repository::new();
        let key = AlertKey::new(9, 9);

        assert_eq!(
            repo.update_alert_status(key, AlertStatus::Closed),
            Err(StatusWriteError::NotFound(key))
        );
    }

    #[test]
    fn test_auto_close_through_repository() {
        let repo = Repository::new();
        let key = AlertKey::new(1, 10);
        repo.insert_alert(alert(1, 10, 20)).unwrap();
        repo.add_participation(vote(1, 20, key, "oui")).unwrap();
        repo.add_participation(vote(2, 21, key, "non")).unwrap();
        repo.add_participation(vote(3, 22, key, "non")).unwrap();
        repo.add_participation(vote(4, 23, key, "non")).unwrap();

        let snapshot = repo.get_alert(key).unwrap();
        let outcome = auto_close(&repo, &snapshot, Utc::now()).unwrap();

        assert!(outcome.closed);
        assert_eq!(repo.get_alert(key).unwrap().status, AlertStatus::Closed);
        assert!(repo.closure_candidates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let key = AlertKey::new(1, 10);

        let repo = Repository::open(&path).await.unwrap();
        assert_eq!(repo.alert_count(), 0);
        repo.insert_alert(alert(1, 10, 20)).unwrap();
        repo.add_participation(Participation::new(1, 20, key, Some(VoteResponse::No)))
            .unwrap();
        repo.update_alert_status(key, AlertStatus::Closed).unwrap();
        assert_eq!(repo.persist().await.unwrap(), Some(1));

        let reopened = Repository::open(&path).await.unwrap();
        let stored = reopened.get_alert(key).unwrap();
        assert_eq!(stored.status, AlertStatus::Closed);
        assert_eq!(stored.participation.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_without_snapshot() {
        let repo = Repository::new();
        assert_eq!(repo.persist().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_requires_snapshot_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("alerts.json");

        let result = Repository::open(&path).await;
        assert!(matches!(
            result,
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound
        ));
    }

    #[tokio::test]
    async fn test_persist_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");
        std::fs::create_dir(&nested).unwrap();
        let key = AlertKey::new(1, 10);

        let repo = Repository::open(nested.join("alerts.json")).await.unwrap();
        repo.insert_alert(alert(1, 10, 20)).unwrap();
        std::fs::remove_dir(&nested).unwrap();

        repo.update_alert_status(key, AlertStatus::Closed).unwrap();
        assert!(matches!(repo.persist().await, Err(StorageError::Io(_))));
        // the write failure leaves memory untouched and the repository usable
        assert_eq!(repo.get_alert(key).unwrap().status, AlertStatus::Closed);
        repo.insert_alert(alert(2, 10, 0)).unwrap();
    }

    #[test]
    fn test_from_alerts_rejects_duplicates() {
        let result = Repository::from_alerts(vec![alert(1, 10, 0), alert(1, 10, 0)]);
        assert!(matches!(result, Err(StorageError::Validation(_))));
    }
}
