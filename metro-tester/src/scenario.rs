//! Named simulation scenarios and the checks they run.
use anyhow::{Result, ensure};
use metro_game::{Catalog, daily_reward_level};

use crate::logic::{SimulationPlan, SimulationSummary};

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    fn new(name: &str, description: &str, plan: SimulationPlan) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            plan: plan.with_expectation(progression_invariants),
        }
    }
}

const SCENARIOS: [(&str, &str); 4] = [
    ("smoke", "A few perfect days: first passes, daily gate, save/reload"),
    (
        "full-campaign",
        "Play every regular station and the final exam with a strong player",
    ),
    (
        "daily-streak",
        "One station a day, daily mission every day once unlocked",
    ),
    (
        "persistence",
        "Mediocre player, game reopened from storage every evening",
    ),
];

#[must_use]
pub fn list_scenarios() -> Vec<(String, String)> {
    SCENARIOS
        .iter()
        .map(|(key, description)| ((*key).to_string(), (*description).to_string()))
        .collect()
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let description = SCENARIOS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, description)| *description)?;
    let plan = match name {
        "smoke" => SimulationPlan::new(1.0, 3)
            .with_quizzes_per_day(4)
            .with_daily_missions()
            .with_reopen_each_day()
            .with_expectation(smoke_expectations),
        "full-campaign" => SimulationPlan::new(0.9, 120)
            .with_quizzes_per_day(6)
            .with_daily_missions()
            .with_final_quiz()
            .with_expectation(campaign_expectations),
        "daily-streak" => SimulationPlan::new(1.0, 30)
            .with_quizzes_per_day(1)
            .with_daily_missions()
            .with_expectation(daily_expectations),
        "persistence" => SimulationPlan::new(0.6, 10)
            .with_quizzes_per_day(5)
            .with_daily_missions()
            .with_reopen_each_day()
            .with_expectation(persistence_expectations),
        _ => return None,
    };
    Some(TestScenario::new(name, description, plan))
}

/// Rules every run must satisfy regardless of how it was played.
fn progression_invariants(summary: &SimulationSummary) -> Result<()> {
    let catalog = Catalog::bundled();
    let state = &summary.final_state;

    ensure!(
        state.current_opening_date_index <= summary.last_date_index,
        "frontier {} past last date {}",
        state.current_opening_date_index,
        summary.last_date_index
    );
    ensure!(
        summary
            .frontier_history
            .windows(2)
            .all(|pair| pair[1] == pair[0] + 1),
        "frontier skipped a date: {:?}",
        summary.frontier_history
    );
    for pass in &summary.passes {
        ensure!(
            pass.index_after <= pass.index_before + 1,
            "{} moved frontier {} -> {}",
            pass.station_id,
            pass.index_before,
            pass.index_after
        );
        ensure!(
            pass.errors_after == 0,
            "{} kept {} errors after passing",
            pass.station_id,
            pass.errors_after
        );
    }

    let mut seen = std::collections::HashSet::new();
    for id in &state.passed_stations {
        ensure!(catalog.contains_station(id), "unknown passed station {id}");
        ensure!(seen.insert(id.as_str()), "station {id} passed twice");
    }
    ensure!(
        summary.daily_early_unlocks == 0,
        "daily mission offered before unlock ({} times)",
        summary.daily_early_unlocks
    );
    ensure!(
        summary.daily_repeat_offers == 0,
        "daily mission offered again on an answered day ({} times)",
        summary.daily_repeat_offers
    );
    ensure!(
        summary.reload_mismatches == 0,
        "{} reloads disagreed with live state",
        summary.reload_mismatches
    );
    ensure!(summary.persisted_matches, "stored state differs from live state");
    Ok(())
}

fn smoke_expectations(summary: &SimulationSummary) -> Result<()> {
    ensure!(!summary.passes.is_empty(), "no station passed");
    ensure!(
        summary.failed_attempts == 0,
        "perfect player failed {} attempts",
        summary.failed_attempts
    );
    ensure!(
        summary.final_state.current_opening_date_index >= 1,
        "first opening date never completed"
    );
    Ok(())
}

fn campaign_expectations(summary: &SimulationSummary) -> Result<()> {
    let catalog = Catalog::bundled();
    let passed = summary.regular_passed(catalog);
    ensure!(
        passed == summary.completion_total,
        "only {passed}/{} regular stations passed",
        summary.completion_total
    );
    ensure!(
        summary.final_state.current_opening_date_index == summary.last_date_index,
        "frontier stopped at {}",
        summary.final_state.current_opening_date_index
    );
    ensure!(
        summary.final_state.final_quiz_completed,
        "final exam not completed after {} attempts",
        summary.final_attempts
    );
    Ok(())
}

fn daily_expectations(summary: &SimulationSummary) -> Result<()> {
    let recorded = summary.final_state.daily_missions_count();
    ensure!(
        recorded == summary.daily_completed,
        "{recorded} missions stored, {} completed",
        summary.daily_completed
    );
    ensure!(
        summary.daily_unavailable == 0,
        "mission could not be built {} times",
        summary.daily_unavailable
    );
    // Four passes unlock missions on day four; every later day earns one.
    let expected = summary.days_played.saturating_sub(3) as usize;
    ensure!(
        summary.daily_completed == expected,
        "{} missions completed, expected {expected}",
        summary.daily_completed
    );
    let reward = daily_reward_level(summary.daily_completed);
    ensure!(reward.stars == 3, "streak earned {} stars", reward.stars);
    Ok(())
}

fn persistence_expectations(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.days_played == 10,
        "stopped after {} days",
        summary.days_played
    );
    ensure!(
        summary.final_state.is_onboarding_complete,
        "onboarding flag lost"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_scenario_resolves() {
        for (key, _) in list_scenarios() {
            let scenario = get_scenario(&key).unwrap();
            assert_eq!(scenario.name, key);
            assert_eq!(scenario.plan.expectations.len(), 2);
        }
        assert!(get_scenario("weather-effects").is_none());
    }
}
