use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::clock::{Clock, LocalClock, date_key};
use crate::constants::GAME_STATE_VERSION;

/// Persisted player progress.
///
/// Every field carries its own serde default so a blob with any subset of
/// keys still loads. Transitions never mutate in place: each returns the next
/// state and leaves `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Schema version; `0` marks a blob written before versioning.
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub passed_stations: Vec<String>,
    #[serde(default)]
    pub current_opening_date_index: usize,
    /// Wrong answers in the current attempt, keyed by station id.
    #[serde(default)]
    pub quiz_errors: BTreeMap<String, u32>,
    #[serde(default)]
    pub completed_daily_missions: Vec<String>,
    /// Date of the most recent completed mission.
    #[serde(default)]
    pub last_daily_mission_date: Option<String>,
    /// Date of the most recent wrong mission answer; locks the rest of that day.
    #[serde(default)]
    pub last_daily_mission_attempt_date: Option<String>,
    #[serde(default)]
    pub is_onboarding_complete: bool,
    #[serde(default)]
    pub final_quiz_completed: bool,
    /// Keys written by newer schema versions, carried forward untouched.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            version: GAME_STATE_VERSION,
            passed_stations: Vec::new(),
            current_opening_date_index: 0,
            quiz_errors: BTreeMap::new(),
            completed_daily_missions: Vec::new(),
            last_daily_mission_date: None,
            last_daily_mission_attempt_date: None,
            is_onboarding_complete: false,
            final_quiz_completed: false,
            extensions: BTreeMap::new(),
        }
    }
}

impl GameState {
    #[must_use]
    pub fn is_station_passed(&self, station_id: &str) -> bool {
        self.passed_stations.iter().any(|id| id == station_id)
    }

    #[must_use]
    pub fn quiz_errors(&self, station_id: &str) -> u32 {
        self.quiz_errors.get(station_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn daily_missions_count(&self) -> usize {
        self.completed_daily_missions.len()
    }

    #[must_use]
    pub fn mark_station_passed(&self, station_id: &str) -> Self {
        if self.is_station_passed(station_id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.passed_stations.push(station_id.to_string());
        next
    }

    #[must_use]
    pub fn record_quiz_error(&self, station_id: &str) -> Self {
        let mut next = self.clone();
        *next.quiz_errors.entry(station_id.to_string()).or_insert(0) += 1;
        next
    }

    #[must_use]
    pub fn reset_quiz_errors(&self, station_id: &str) -> Self {
        let mut next = self.clone();
        next.quiz_errors.remove(station_id);
        next
    }

    /// Move the frontier one date forward.
    ///
    /// No upper bound is applied here: callers check the catalog's last date
    /// index first (see [`crate::progression::apply_station_pass`]).
    #[must_use]
    pub fn advance_opening_date(&self) -> Self {
        let mut next = self.clone();
        next.current_opening_date_index += 1;
        next
    }

    #[must_use]
    pub fn complete_onboarding(&self) -> Self {
        let mut next = self.clone();
        next.is_onboarding_complete = true;
        next
    }

    #[must_use]
    pub fn complete_final_quiz(&self) -> Self {
        let mut next = self.clone();
        next.final_quiz_completed = true;
        next
    }

    /// Record today's mission (local time zone). Idempotent per date.
    #[must_use]
    pub fn complete_daily_mission(&self) -> Self {
        self.complete_daily_mission_on(LocalClock.today())
    }

    #[must_use]
    pub fn complete_daily_mission_on(&self, today: NaiveDate) -> Self {
        let key = date_key(today);
        if self.completed_daily_missions.contains(&key) {
            return self.clone();
        }
        let mut next = self.clone();
        next.completed_daily_missions.push(key.clone());
        next.last_daily_mission_date = Some(key);
        next
    }

    /// Record a wrong mission answer: nothing is earned, but the day is used.
    #[must_use]
    pub fn record_daily_attempt_on(&self, today: NaiveDate) -> Self {
        let mut next = self.clone();
        next.last_daily_mission_attempt_date = Some(date_key(today));
        next
    }

    #[must_use]
    pub fn is_daily_mission_attempted_on(&self, today: NaiveDate) -> bool {
        self.last_daily_mission_attempt_date.as_deref() == Some(date_key(today).as_str())
    }

    #[must_use]
    pub fn is_daily_mission_completed(&self) -> bool {
        self.is_daily_mission_completed_on(LocalClock.today())
    }

    #[must_use]
    pub fn is_daily_mission_completed_on(&self, today: NaiveDate) -> bool {
        let key = date_key(today);
        self.completed_daily_missions.contains(&key)
    }

    /// Reconcile a loaded state with the catalog: drop ids the catalog does
    /// not know, collapse duplicates, clamp the frontier to the last date.
    #[must_use]
    pub fn sanitize(&self, catalog: &Catalog) -> Self {
        let mut next = self.clone();

        let mut seen = Vec::with_capacity(next.passed_stations.len());
        next.passed_stations.retain(|id| {
            if !catalog.contains_station(id) || seen.contains(id) {
                return false;
            }
            seen.push(id.clone());
            true
        });

        let passed = next.passed_stations.clone();
        next.quiz_errors
            .retain(|id, _| catalog.contains_station(id) && !passed.contains(id));

        let mut dates = Vec::with_capacity(next.completed_daily_missions.len());
        next.completed_daily_missions.retain(|date| {
            if dates.contains(date) {
                return false;
            }
            dates.push(date.clone());
            true
        });

        let last = catalog.last_date_index().unwrap_or(0);
        if next.current_opening_date_index > last {
            log::warn!(
                "opening date index {} beyond catalog range, clamping to {last}",
                next.current_opening_date_index
            );
            next.current_opening_date_index = last;
        }

        if next != *self {
            log::debug!("sanitized persisted game state against catalog");
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn mark_station_passed_adds_once() {
        let state = GameState::default();
        let once = state.mark_station_passed("sokolniki");
        assert_eq!(once.passed_stations, vec!["sokolniki"]);
        assert!(state.passed_stations.is_empty(), "input left untouched");

        let twice = once.mark_station_passed("sokolniki");
        assert_eq!(twice, once);
    }

    #[test]
    fn quiz_errors_accumulate_and_are_removed() {
        let state = GameState::default()
            .record_quiz_error("lubyanka")
            .record_quiz_error("lubyanka");
        assert_eq!(state.quiz_errors("lubyanka"), 2);
        assert_eq!(state.quiz_errors("sokol"), 0);

        let cleared = state.reset_quiz_errors("lubyanka");
        assert!(!cleared.quiz_errors.contains_key("lubyanka"));
    }

    #[test]
    fn advance_opening_date_steps_by_one() {
        let state = GameState::default().advance_opening_date();
        assert_eq!(state.current_opening_date_index, 1);
        assert_eq!(state.advance_opening_date().current_opening_date_index, 2);
    }

    #[test]
    fn flags_are_set() {
        let state = GameState::default().complete_onboarding().complete_final_quiz();
        assert!(state.is_onboarding_complete);
        assert!(state.final_quiz_completed);
    }

    #[test]
    fn daily_mission_is_idempotent_per_date() {
        let today = date(2025, 5, 15);
        let once = GameState::default().complete_daily_mission_on(today);
        let twice = once.complete_daily_mission_on(today);
        assert_eq!(once.completed_daily_missions, twice.completed_daily_missions);
        assert_eq!(twice.completed_daily_missions, vec!["2025-05-15"]);
        assert_eq!(twice.last_daily_mission_date.as_deref(), Some("2025-05-15"));
        assert!(twice.is_daily_mission_completed_on(today));
        assert!(!twice.is_daily_mission_completed_on(date(2025, 5, 16)));

        let next_day = twice.complete_daily_mission_on(date(2025, 5, 16));
        assert_eq!(next_day.daily_missions_count(), 2);
        assert_eq!(
            next_day.last_daily_mission_date.as_deref(),
            Some("2025-05-16")
        );
    }

    #[test]
    fn wrong_answer_keeps_last_completed_date() {
        let state = GameState::default()
            .complete_daily_mission_on(date(2025, 1, 1))
            .record_daily_attempt_on(date(2025, 1, 2));
        assert_eq!(state.completed_daily_missions, vec!["2025-01-01"]);
        assert_eq!(state.last_daily_mission_date.as_deref(), Some("2025-01-01"));
        assert_eq!(
            state.last_daily_mission_attempt_date.as_deref(),
            Some("2025-01-02")
        );
        assert!(state.is_daily_mission_attempted_on(date(2025, 1, 2)));
        assert!(!state.is_daily_mission_attempted_on(date(2025, 1, 1)));
        assert!(!state.is_daily_mission_completed_on(date(2025, 1, 2)));
    }

    #[test]
    fn local_clock_variants_agree() {
        let state = GameState::default().complete_daily_mission();
        assert!(state.is_daily_mission_completed());
        assert_eq!(state.completed_daily_missions.len(), 1);
    }

    #[test]
    fn sanitize_drops_unknown_ids_and_clamps_frontier() {
        let catalog = Catalog::bundled();
        let mut state = GameState::default()
            .mark_station_passed("sokolniki")
            .mark_station_passed("atlantis")
            .record_quiz_error("atlantis")
            .record_quiz_error("sokolniki")
            .record_quiz_error("lubyanka");
        state.passed_stations.push("sokolniki".to_string());
        state.current_opening_date_index = 10_000;

        let clean = state.sanitize(catalog);
        assert_eq!(clean.passed_stations, vec!["sokolniki"]);
        assert_eq!(clean.quiz_errors.keys().collect::<Vec<_>>(), vec!["lubyanka"]);
        assert_eq!(
            Some(clean.current_opening_date_index),
            catalog.last_date_index()
        );
    }
}
