//! Station availability, the unlock algorithm and overall progress.
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Station};
use crate::daily::{RewardLevel, daily_reward_level};
use crate::state::GameState;

/// What the map renderer needs to draw markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub available: Vec<String>,
    pub passed: Vec<String>,
}

/// Aggregate progress shown in the header bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub passed: usize,
    pub total: usize,
    pub percent: f64,
    /// Date at the frontier, `None` for an empty catalog.
    pub current_date: Option<String>,
    pub daily_missions: usize,
    pub reward: RewardLevel,
    pub final_quiz_available: bool,
}

#[must_use]
pub fn station_date_index(catalog: &Catalog, station: &Station) -> Option<usize> {
    catalog.opening_date_index(&station.opened_date)
}

#[must_use]
pub fn is_station_available(catalog: &Catalog, state: &GameState, station: &Station) -> bool {
    station_date_index(catalog, station)
        .is_some_and(|index| index <= state.current_opening_date_index)
}

#[must_use]
pub fn available_stations<'a>(catalog: &'a Catalog, state: &GameState) -> Vec<&'a Station> {
    let dates = catalog.opening_dates();
    let frontier = dates.get(state.current_opening_date_index).copied();
    catalog
        .stations
        .iter()
        .filter(|station| match frontier {
            Some(date) => station.opened_date.as_str() <= date,
            // Frontier past the catalog: everything opened is reachable.
            None => !dates.is_empty(),
        })
        .collect()
}

#[must_use]
pub fn available_station_ids(catalog: &Catalog, state: &GameState) -> Vec<String> {
    available_stations(catalog, state)
        .into_iter()
        .map(|s| s.id.clone())
        .collect()
}

#[must_use]
pub fn map_snapshot(catalog: &Catalog, state: &GameState) -> MapSnapshot {
    MapSnapshot {
        available: available_station_ids(catalog, state),
        passed: state.passed_stations.clone(),
    }
}

/// True when every regular station opened on the frontier date is passed.
#[must_use]
pub fn frontier_complete(catalog: &Catalog, state: &GameState) -> bool {
    let dates = catalog.opening_dates();
    let Some(date) = dates.get(state.current_opening_date_index) else {
        return false;
    };
    catalog
        .stations_opened_on(date)
        .filter(|s| !s.is_special_line)
        .all(|s| state.is_station_passed(&s.id))
}

/// Apply a passed station quiz: mark the station, clear its error counter,
/// then move the frontier forward by at most one date.
#[must_use]
pub fn apply_station_pass(catalog: &Catalog, state: &GameState, station_id: &str) -> GameState {
    debug_assert!(
        catalog.contains_station(station_id),
        "unknown station id `{station_id}`"
    );
    let next = state
        .mark_station_passed(station_id)
        .reset_quiz_errors(station_id);

    let Some(last) = catalog.last_date_index() else {
        return next;
    };
    if next.current_opening_date_index < last && frontier_complete(catalog, &next) {
        let advanced = next.advance_opening_date();
        log::debug!(
            "frontier advanced to {} after passing {station_id}",
            advanced.current_opening_date_index
        );
        return advanced;
    }
    next
}

/// Passed stations that count toward completion.
#[must_use]
pub fn passed_regular_count(catalog: &Catalog, state: &GameState) -> usize {
    catalog
        .regular_stations()
        .filter(|s| state.is_station_passed(&s.id))
        .count()
}

/// The final quiz opens once every regular station is passed and stays
/// closed after it has been completed.
#[must_use]
pub fn final_quiz_available(catalog: &Catalog, state: &GameState) -> bool {
    let total = catalog.completion_total();
    total > 0 && passed_regular_count(catalog, state) >= total && !state.final_quiz_completed
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_summary(catalog: &Catalog, state: &GameState) -> ProgressSummary {
    let passed = passed_regular_count(catalog, state);
    let total = catalog.completion_total();
    let percent = if total > 0 {
        passed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let daily_missions = state.daily_missions_count();
    ProgressSummary {
        passed,
        total,
        percent,
        current_date: catalog
            .opening_dates()
            .get(state.current_opening_date_index)
            .map(|d| (*d).to_string()),
        daily_missions,
        reward: daily_reward_level(daily_missions),
        final_quiz_available: final_quiz_available(catalog, state),
    }
}
