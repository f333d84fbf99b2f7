use colored::Colorize;
use metro_game::Catalog;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::logic::simulation::{CampaignSimulation, SimulationPlan, SimulationSummary};
use crate::scenario::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester<'a> {
    catalog: &'a Catalog,
    accuracy: Option<f64>,
    verbose: bool,
}

impl<'a> LogicTester<'a> {
    pub const fn new(catalog: &'a Catalog, verbose: bool) -> Self {
        Self {
            catalog,
            accuracy: None,
            verbose,
        }
    }

    /// Force every plan to use the given player accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy: Option<f64>) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let plan = match self.accuracy {
            Some(accuracy) => scenario.plan.clone().with_accuracy(accuracy),
            None => scenario.plan.clone(),
        };

        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing scenario: {} (accuracy: {:.2} seed: {}) {}",
                        scenario.name.bright_white(),
                        plan.accuracy,
                        seed,
                        scenario.description.dimmed()
                    );
                }
                self.run_single_scenario(&scenario.name, &plan, seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        name: &str,
        plan: &SimulationPlan,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let simulation = CampaignSimulation::new(self.catalog, self.verbose);
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let summary = simulation.run(plan, iteration_seed);

            if let Some(err) = evaluate_expectations(plan, &summary) {
                failures.push(format!(
                    "Iteration {}: {} | {}",
                    i + 1,
                    err,
                    summary.describe()
                ));
                if self.verbose {
                    println!(
                        "  ❌ Iteration {}/{} failed: {}",
                        i + 1,
                        iterations,
                        err.red()
                    );
                }
            } else {
                successes += 1;
                let duration = start_time.elapsed();
                performance_data.push(duration);
                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) days:{} passes:{}",
                        i + 1,
                        iterations,
                        summary.days_played,
                        summary.passes.len()
                    );
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    plan.expectations
        .iter()
        .find_map(|expectation| expectation.check(summary).err())
        .map(|err| err.to_string())
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::get_scenario;

    #[test]
    fn smoke_scenario_passes_every_seed() {
        let tester = LogicTester::new(Catalog::bundled(), false);
        let scenario = get_scenario("smoke").unwrap();
        let results = tester.run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 2);
        }
    }

    #[test]
    fn failing_expectation_is_reported() {
        let tester = LogicTester::new(Catalog::bundled(), false);
        let scenario = TestScenario {
            name: "impossible".to_string(),
            description: "never satisfied".to_string(),
            plan: SimulationPlan::new(1.0, 1)
                .with_expectation(|_: &SimulationSummary| -> anyhow::Result<()> {
                    anyhow::bail!("nope")
                }),
        };
        let result = &tester.run_scenario(&scenario, &[3], 1)[0];
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].contains("nope"));
        assert_eq!(result.average_duration, Duration::ZERO);
    }

    #[test]
    fn accuracy_override_applies() {
        let tester = LogicTester::new(Catalog::bundled(), false).with_accuracy(Some(0.0));
        let scenario = TestScenario {
            name: "clueless".to_string(),
            description: "nobody passes".to_string(),
            plan: SimulationPlan::new(1.0, 1).with_expectation(
                |s: &SimulationSummary| -> anyhow::Result<()> {
                    anyhow::ensure!(s.passes.is_empty(), "passed with zero accuracy");
                    Ok(())
                },
            ),
        };
        assert!(tester.run_scenario(&scenario, &[4], 1)[0].passed);
    }

    #[test]
    fn durations_serialize_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        assert_eq!(json["performance_data"][0], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.average_duration, Duration::from_millis(12));
    }
}
