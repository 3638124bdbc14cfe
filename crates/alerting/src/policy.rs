//! Alert Closure Policy
//!
//! An alert is closed automatically once it is at least 15 minutes old and
//! strictly more participants answered "non" than "oui".

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::model::{Alert, Participation, VoteResponse};

/// Minimum alert age before votes are considered
pub const MIN_AGE_MINUTES: i64 = 15;

const MS_PER_MINUTE: i64 = 60_000;

/// Reason reported when the alert is younger than [`MIN_AGE_MINUTES`]
pub const REASON_TOO_EARLY: &str = "Moins de 15 minutes";

/// Reason reported when negatives do not outnumber affirmatives
pub const REASON_INSUFFICIENT_NEGATIVES: &str = "NON <= OUI";

/// Vote counts over an alert's participations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
}

impl Tally {
    /// Count recognized responses; anything else is ignored
    pub fn count(votes: &[Participation]) -> Self {
        votes.iter().fold(Self::default(), |mut tally, vote| {
            match vote.response {
                Some(VoteResponse::Yes) => tally.yes += 1,
                Some(VoteResponse::No) => tally.no += 1,
                Some(VoteResponse::Unrecognized(_)) | None => {}
            }
            tally
        })
    }

    /// Strict negative majority; a tie keeps the alert open
    pub fn negatives_win(&self) -> bool {
        self.no > self.yes
    }
}

/// Outcome of evaluating one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Alert is younger than the minimum age
    TooEarly { elapsed_minutes: i64 },
    /// Old enough, but "non" does not outnumber "oui"
    InsufficientNegatives(Tally),
    /// Old enough and "non" outnumbers "oui"
    Close(Tally),
}

impl Decision {
    pub fn should_close(&self) -> bool {
        matches!(self, Decision::Close(_))
    }

    /// Human-readable reason for not closing
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Decision::TooEarly { .. } => Some(REASON_TOO_EARLY),
            Decision::InsufficientNegatives(_) => Some(REASON_INSUFFICIENT_NEGATIVES),
            Decision::Close(_) => None,
        }
    }
}

/// Decide whether `alert` should be closed at `now`.
///
/// Pure: the alert's current status is not consulted, so evaluating an
/// already closed alert with the same votes gives the same answer.
pub fn evaluate(alert: &Alert, now: DateTime<Utc>) -> Decision {
    let elapsed_ms = (now - alert.created_at).num_milliseconds();

    if elapsed_ms < MIN_AGE_MINUTES * MS_PER_MINUTE {
        let decision = Decision::TooEarly {
            elapsed_minutes: elapsed_ms / MS_PER_MINUTE,
        };
        debug!("Alert {}: {:?}", alert.key(), decision);
        return decision;
    }

    let tally = Tally::count(&alert.participation);
    let decision = if tally.negatives_win() {
        Decision::Close(tally)
    } else {
        Decision::InsufficientNegatives(tally)
    };

    debug!("Alert {}: {:?}", alert.key(), decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertKey;
    use chrono::Duration;
    use proptest::prelude::*;

    fn alert_with_votes(age: Duration, responses: &[&str], now: DateTime<Utc>) -> Alert {
        let key = AlertKey::new(1, 10);
        let mut alert = Alert::new(key, now - age);
        alert.participation = responses
            .iter()
            .enumerate()
            .map(|(i, r)| Participation::new(i as i32 + 1, 100 + i as i32, key, Some((*r).into())))
            .collect();
        alert
    }

    #[test]
    fn test_too_early_ignores_votes() {
        let now = Utc::now();
        let alert = alert_with_votes(Duration::minutes(10), &["oui", "oui", "oui", "non"], now);

        let decision = evaluate(&alert, now);
        assert_eq!(decision, Decision::TooEarly { elapsed_minutes: 10 });
        assert_eq!(decision.reason(), Some("Moins de 15 minutes"));
    }

    #[test]
    fn test_negative_majority_closes() {
        let now = Utc::now();
        let alert = alert_with_votes(Duration::minutes(20), &["oui", "non", "non", "non"], now);

        let decision = evaluate(&alert, now);
        assert_eq!(decision, Decision::Close(Tally { yes: 1, no: 3 }));
        assert!(decision.should_close());
        assert_eq!(decision.reason(), None);
    }

    #[test]
    fn test_tie_stays_open() {
        let now = Utc::now();
        let alert = alert_with_votes(Duration::minutes(30), &["oui", "oui", "non", "non"], now);

        let decision = evaluate(&alert, now);
        assert_eq!(decision, Decision::InsufficientNegatives(Tally { yes: 2, no: 2 }));
        assert_eq!(decision.reason(), Some("NON <= OUI"));
    }

    #[test]
    fn test_no_votes_stays_open() {
        let now = Utc::now();
        let alert = alert_with_votes(Duration::minutes(16), &[], now);

        assert_eq!(
            evaluate(&alert, now),
            Decision::InsufficientNegatives(Tally::default())
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let now = Utc::now();
        let just_under = alert_with_votes(
            Duration::minutes(15) - Duration::milliseconds(1),
            &["non"],
            now,
        );
        assert!(matches!(evaluate(&just_under, now), Decision::TooEarly { .. }));

        let exactly = alert_with_votes(Duration::minutes(15), &["non"], now);
        assert!(evaluate(&exactly, now).should_close());
    }

    #[test]
    fn test_future_creation_is_too_early() {
        let now = Utc::now();
        let alert = alert_with_votes(Duration::minutes(-5), &["non"], now);
        assert!(matches!(evaluate(&alert, now), Decision::TooEarly { .. }));
    }

    #[test]
    fn test_unrecognized_responses_excluded() {
        let now = Utc::now();
        let mut alert = alert_with_votes(Duration::minutes(20), &["maybe", "oui"], now);
        alert.participation.push(Participation::new(9, 200, alert.key(), None));

        assert_eq!(Tally::count(&alert.participation), Tally { yes: 1, no: 0 });
    }

    #[test]
    fn test_closed_alert_reevaluates_the_same() {
        let now = Utc::now();
        let mut alert = alert_with_votes(Duration::minutes(40), &["non", "non"], now);
        let first = evaluate(&alert, now);

        alert.status = crate::model::AlertStatus::Closed;
        assert_eq!(evaluate(&alert, now), first);
    }

    fn response_strategy() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("oui"), Just("non"), Just("maybe"), Just("")]
    }

    proptest! {
        #[test]
        fn young_alerts_are_never_closed(
            age_ms in 0i64..(MIN_AGE_MINUTES * MS_PER_MINUTE),
            responses in prop::collection::vec(response_strategy(), 0..20),
        ) {
            let now = Utc::now();
            let alert = alert_with_votes(Duration::milliseconds(age_ms), &responses, now);
            let is_too_early = matches!(evaluate(&alert, now), Decision::TooEarly { .. });
            prop_assert!(is_too_early);
        }

        #[test]
        fn mature_alerts_close_iff_negatives_win(
            extra_ms in 0i64..(7 * 24 * 60 * MS_PER_MINUTE),
            responses in prop::collection::vec(response_strategy(), 0..20),
        ) {
            let now = Utc::now();
            let age = Duration::milliseconds(MIN_AGE_MINUTES * MS_PER_MINUTE + extra_ms);
            let alert = alert_with_votes(age, &responses, now);

            let yes = responses.iter().filter(|r| **r == "oui").count();
            let no = responses.iter().filter(|r| **r == "non").count();
            let tally = Tally { yes, no };

            let expected = if no > yes {
                Decision::Close(tally)
            } else {
                Decision::InsufficientNegatives(tally)
            };
            prop_assert_eq!(evaluate(&alert, now), expected);
        }
    }
}
