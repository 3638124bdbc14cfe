//! Alert and Participation records
//!
//! Wire names and literal values match the data already stored by the
//! reporting backend (`"ouverte"`/`"fermée"`, `"oui"`/`"non"`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of an alert: alert id plus owning user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub id_alert: i32,
    pub user_id: i32,
}

impl AlertKey {
    pub fn new(id_alert: i32, user_id: i32) -> Self {
        Self { id_alert, user_id }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id_alert, self.user_id)
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertStatus {
    #[default]
    #[serde(rename = "ouverte")]
    Open,
    #[serde(rename = "fermée")]
    Closed,
}

impl AlertStatus {
    /// Stored literal for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "ouverte",
            AlertStatus::Closed => "fermée",
        }
    }
}

/// A participant's answer to "is this alert still valid?"
///
/// Literals other than `"oui"` and `"non"` are kept verbatim so they
/// round-trip through storage, but they never count as a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VoteResponse {
    Yes,
    No,
    Unrecognized(String),
}

impl From<String> for VoteResponse {
    fn from(value: String) -> Self {
        match value.as_str() {
            "oui" => VoteResponse::Yes,
            "non" => VoteResponse::No,
            _ => VoteResponse::Unrecognized(value),
        }
    }
}

impl From<&str> for VoteResponse {
    fn from(value: &str) -> Self {
        VoteResponse::from(value.to_string())
    }
}

impl From<VoteResponse> for String {
    fn from(value: VoteResponse) -> Self {
        match value {
            VoteResponse::Yes => "oui".to_string(),
            VoteResponse::No => "non".to_string(),
            VoteResponse::Unrecognized(raw) => raw,
        }
    }
}

/// A user's vote on an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub id_participation: i32,
    /// Voting user
    pub user_id: i32,
    /// Owning alert id
    pub id_alert: i32,
    /// Owning alert's user id
    pub alert_user_id: i32,
    #[serde(default)]
    pub response: Option<VoteResponse>,
    #[serde(default)]
    pub date_response: Option<DateTime<Utc>>,
}

impl Participation {
    /// Create a vote on `alert`
    pub fn new(
        id_participation: i32,
        user_id: i32,
        alert: AlertKey,
        response: Option<VoteResponse>,
    ) -> Self {
        Self {
            id_participation,
            user_id,
            id_alert: alert.id_alert,
            alert_user_id: alert.user_id,
            response,
            date_response: None,
        }
    }

    /// Key of the alert this vote belongs to
    pub fn alert_key(&self) -> AlertKey {
        AlertKey::new(self.id_alert, self.alert_user_id)
    }
}

/// A citizen-submitted report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id_alert: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: AlertStatus,
    pub intensity: String,
    pub location_lat: f64,
    pub location_lon: f64,
    pub id_category: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub participation: Vec<Participation>,
}

impl Alert {
    /// Create an open alert with no votes and empty descriptive fields
    pub fn new(key: AlertKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id_alert: key.id_alert,
            user_id: key.user_id,
            title: String::new(),
            description: String::new(),
            status: AlertStatus::Open,
            intensity: String::new(),
            location_lat: 0.0,
            location_lon: 0.0,
            id_category: 0,
            created_at,
            participation: Vec::new(),
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.id_alert, self.user_id)
    }

    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }
}
