//! Centralized tuning constants for the metro progression and quiz engine.
//!
//! These values define the pass thresholds, reward tiers and pacing of the
//! game. Keeping them together ensures that gameplay can only be adjusted via
//! code changes reviewed in version control, rather than through external
//! JSON assets.

use std::time::Duration;

// Persistence ---------------------------------------------------------------
pub const STORAGE_KEY: &str = "moscow-metro-game";
pub const GAME_STATE_VERSION: u32 = 2;

// Quiz sizing ---------------------------------------------------------------
pub const STATION_QUIZ_LEN: usize = 5;
pub const FINAL_QUIZ_LEN: usize = 10;
pub const FINAL_QUIZ_MIN_STATIONS: usize = 2;
pub const QUIZ_OPTION_COUNT: usize = 4;

// Error tolerance: reaching this many wrong answers fails the attempt.
pub const STATION_QUIZ_ERROR_TOLERANCE: u32 = 2;
pub const FINAL_QUIZ_ERROR_TOLERANCE: u32 = 3;

/// Pause between the last answer and the pass/fail verdict.
pub const REVEAL_DELAY: Duration = Duration::from_millis(1_500);

// Daily missions ------------------------------------------------------------
pub const DAILY_MISSION_MIN_PASSED: usize = 4;
pub const DAILY_TRAIN_MISSION_CHANCE: f64 = 0.35;
pub const DAILY_MISSION_OPTION_COUNT: usize = 4;

// Reward tiers (cumulative lifetime completions).
pub const DAILY_REWARD_STAR_1: usize = 5;
pub const DAILY_REWARD_STAR_2: usize = 15;
pub const DAILY_REWARD_STAR_3: usize = 23;
pub const DAILY_REWARD_CHAMPION: usize = 30;
pub const CHAMPION_TITLE: &str = "Чемпион";

// Station display ---------------------------------------------------------
pub(crate) const DISPLAY_MAX_FACTS: usize = 12;
pub(crate) const DISPLAY_DUPLICATE_PREFIX: usize = 12;
