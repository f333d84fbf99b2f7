//! Daily mission eligibility, selection and reward tiers.
use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::catalog::{Catalog, Station};
use crate::constants::{
    CHAMPION_TITLE, DAILY_MISSION_MIN_PASSED, DAILY_MISSION_OPTION_COUNT, DAILY_REWARD_CHAMPION,
    DAILY_REWARD_STAR_1, DAILY_REWARD_STAR_2, DAILY_REWARD_STAR_3, DAILY_TRAIN_MISSION_CHANCE,
};
use crate::state::GameState;

const REWARD_THRESHOLDS: [usize; 4] = [
    DAILY_REWARD_STAR_1,
    DAILY_REWARD_STAR_2,
    DAILY_REWARD_STAR_3,
    DAILY_REWARD_CHAMPION,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DailyStatus {
    Locked { passed: usize, required: usize },
    CompletedToday,
    /// Answered wrong today; the next mission comes tomorrow.
    MissedToday,
    Available,
}

impl DailyStatus {
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for DailyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked { passed, required } => write!(f, "{passed}/{required}"),
            Self::CompletedToday => f.write_str("completed"),
            Self::MissedToday => f.write_str("missed"),
            Self::Available => f.write_str("available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DailyMissionError {
    #[error("daily missions unlock after {required} passed stations ({passed}/{required})")]
    Locked { passed: usize, required: usize },
    #[error("today's daily mission is already completed")]
    AlreadyCompleted,
    #[error("today's daily mission was already answered")]
    AlreadyAttempted,
    #[error("not enough catalog entries to build a daily mission")]
    InsufficientData,
}

#[must_use]
pub fn daily_status(state: &GameState, today: NaiveDate) -> DailyStatus {
    let passed = state.passed_stations.len();
    if passed < DAILY_MISSION_MIN_PASSED {
        DailyStatus::Locked {
            passed,
            required: DAILY_MISSION_MIN_PASSED,
        }
    } else if state.is_daily_mission_completed_on(today) {
        DailyStatus::CompletedToday
    } else if state.is_daily_mission_attempted_on(today) {
        DailyStatus::MissedToday
    } else {
        DailyStatus::Available
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionKind {
    Station,
    Train,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionOutcome {
    Correct,
    Incorrect,
}

/// A single-question, single-chance identification quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMission {
    pub kind: MissionKind,
    pub target_id: String,
    pub target_name: String,
    pub options: Vec<MissionOption>,
    answered: Option<MissionOutcome>,
}

impl DailyMission {
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match self.kind {
            MissionKind::Station => "Какая это станция?",
            MissionKind::Train => "Какой это поезд?",
        }
    }

    /// Record the one allowed answer. Later calls return `None`.
    pub fn answer(&mut self, option_id: &str) -> Option<MissionOutcome> {
        if self.answered.is_some() {
            return None;
        }
        let outcome = if option_id == self.target_id {
            MissionOutcome::Correct
        } else {
            MissionOutcome::Incorrect
        };
        self.answered = Some(outcome);
        Some(outcome)
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<MissionOutcome> {
        self.answered
    }
}

fn assemble<R: Rng + ?Sized>(
    kind: MissionKind,
    target: MissionOption,
    others: &[MissionOption],
    rng: &mut R,
) -> DailyMission {
    let mut options: Vec<MissionOption> = others
        .choose_multiple(rng, DAILY_MISSION_OPTION_COUNT - 1)
        .cloned()
        .collect();
    options.push(target.clone());
    options.shuffle(rng);
    DailyMission {
        kind,
        target_id: target.id,
        target_name: target.name,
        options,
        answered: None,
    }
}

fn train_mission<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> Option<DailyMission> {
    if catalog.trains.len() < DAILY_MISSION_OPTION_COUNT {
        return None;
    }
    let target = catalog.trains.choose(rng)?;
    let others: Vec<MissionOption> = catalog
        .trains
        .iter()
        .filter(|t| t.id != target.id && t.name != target.name)
        .map(|t| MissionOption {
            id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect();
    if others.len() < DAILY_MISSION_OPTION_COUNT - 1 {
        return None;
    }
    let target = MissionOption {
        id: target.id.clone(),
        name: target.name.clone(),
    };
    Some(assemble(MissionKind::Train, target, &others, rng))
}

fn station_mission<R: Rng + ?Sized>(
    catalog: &Catalog,
    state: &GameState,
    rng: &mut R,
) -> Option<DailyMission> {
    // Only passed stations: locked content never leaks into a mission.
    let passed: Vec<&Station> = catalog
        .stations
        .iter()
        .filter(|s| state.is_station_passed(&s.id))
        .collect();
    let target = passed.choose(rng)?;
    let mut others: Vec<MissionOption> = Vec::new();
    for station in &passed {
        if station.name == target.name || others.iter().any(|o| o.name == station.name) {
            continue;
        }
        others.push(MissionOption {
            id: station.id.clone(),
            name: station.name.clone(),
        });
    }
    if others.len() < DAILY_MISSION_OPTION_COUNT - 1 {
        return None;
    }
    let target = MissionOption {
        id: target.id.clone(),
        name: target.name.clone(),
    };
    Some(assemble(MissionKind::Station, target, &others, rng))
}

/// Pick today's mission.
///
/// A train mission is drawn with probability 0.35, otherwise a station
/// mission over passed stations only. When the drawn category cannot supply
/// four distinct options the other one is tried.
///
/// # Errors
///
/// Refuses while locked, once today's mission is done, or when neither
/// category has enough entries.
pub fn select_daily_mission<R: Rng + ?Sized>(
    state: &GameState,
    catalog: &Catalog,
    today: NaiveDate,
    rng: &mut R,
) -> Result<DailyMission, DailyMissionError> {
    match daily_status(state, today) {
        DailyStatus::Locked { passed, required } => {
            return Err(DailyMissionError::Locked { passed, required });
        }
        DailyStatus::CompletedToday => return Err(DailyMissionError::AlreadyCompleted),
        DailyStatus::MissedToday => return Err(DailyMissionError::AlreadyAttempted),
        DailyStatus::Available => {}
    }

    let mission = if rng.gen_bool(DAILY_TRAIN_MISSION_CHANCE) {
        train_mission(catalog, rng).or_else(|| station_mission(catalog, state, rng))
    } else {
        station_mission(catalog, state, rng).or_else(|| train_mission(catalog, rng))
    };
    mission.ok_or(DailyMissionError::InsufficientData)
}

/// Apply a mission result to the state. Only a correct answer counts toward
/// rewards; either answer closes missions until the next calendar day.
#[must_use]
pub fn apply_mission_outcome(
    state: &GameState,
    outcome: MissionOutcome,
    today: NaiveDate,
) -> GameState {
    match outcome {
        MissionOutcome::Correct => state.complete_daily_mission_on(today),
        MissionOutcome::Incorrect => state.record_daily_attempt_on(today),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLevel {
    pub stars: u8,
    pub title: String,
}

/// Reward tier for a lifetime count of completed missions.
#[must_use]
pub fn daily_reward_level(count: usize) -> RewardLevel {
    let stars = match count {
        c if c >= DAILY_REWARD_STAR_3 => 3,
        c if c >= DAILY_REWARD_STAR_2 => 2,
        c if c >= DAILY_REWARD_STAR_1 => 1,
        _ => 0,
    };
    let title = if count >= DAILY_REWARD_CHAMPION {
        CHAMPION_TITLE.to_string()
    } else {
        String::new()
    };
    RewardLevel { stars, title }
}

/// The next tier boundary above `count`, `None` once the champion title is
/// earned.
#[must_use]
pub fn next_reward_threshold(count: usize) -> Option<usize> {
    REWARD_THRESHOLDS.into_iter().find(|&t| t > count)
}
