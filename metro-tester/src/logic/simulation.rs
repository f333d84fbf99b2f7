use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use metro_game::constants::REVEAL_DELAY;
use metro_game::{
    Catalog, DailyMissionError, GameState, ManualClock, MemoryStore, MetroEngine, MissionOutcome,
    QuizController, StateRepository, Verdict,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::player::SimulatedPlayer;

type SimEngine = MetroEngine<MemoryStore, Rc<ManualClock>>;

/// Attempts at one station before the player wanders off to another marker.
const ATTEMPTS_PER_VISIT: u32 = 3;
/// Keeps the player's choices independent from question generation.
const PLAYER_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// How a simulated campaign is played.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub accuracy: f64,
    pub max_days: u32,
    pub quizzes_per_day: usize,
    pub daily_missions: bool,
    pub final_quiz: bool,
    pub reopen_each_day: bool,
    pub start_date: NaiveDate,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(accuracy: f64, max_days: u32) -> Self {
        Self {
            accuracy,
            max_days,
            quizzes_per_day: 3,
            daily_missions: false,
            final_quiz: false,
            reopen_each_day: false,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_quizzes_per_day(mut self, quizzes: usize) -> Self {
        self.quizzes_per_day = quizzes;
        self
    }

    #[must_use]
    pub const fn with_daily_missions(mut self) -> Self {
        self.daily_missions = true;
        self
    }

    #[must_use]
    pub const fn with_final_quiz(mut self) -> Self {
        self.final_quiz = true;
        self
    }

    #[must_use]
    pub const fn with_reopen_each_day(mut self) -> Self {
        self.reopen_each_day = true;
        self
    }

    /// Override the accuracy, e.g. from the command line.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// # Errors
    ///
    /// Returns the expectation's failure.
    pub fn check(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

/// One passed station quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    pub station_id: String,
    pub day: u32,
    pub attempts: u32,
    pub index_before: usize,
    pub index_after: usize,
    pub errors_after: u32,
}

#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub days_played: u32,
    pub quiz_attempts: usize,
    pub failed_attempts: usize,
    pub passes: Vec<PassRecord>,
    /// Frontier index after every change, starting from the initial one.
    pub frontier_history: Vec<usize>,
    pub daily_completed: usize,
    pub daily_missed: usize,
    pub daily_unavailable: usize,
    /// Days a mission could be drawn before four stations were passed.
    pub daily_early_unlocks: usize,
    /// Times a second mission was offered on a day already answered.
    pub daily_repeat_offers: usize,
    pub reload_mismatches: usize,
    pub final_attempts: usize,
    pub final_verdict: Option<Verdict>,
    pub completion_total: usize,
    pub last_date_index: usize,
    pub final_state: GameState,
    /// Whether the store still decodes to `final_state`.
    pub persisted_matches: bool,
}

impl SimulationSummary {
    fn new(seed: u64, catalog: &Catalog, initial: &GameState) -> Self {
        Self {
            seed,
            days_played: 0,
            quiz_attempts: 0,
            failed_attempts: 0,
            passes: Vec::new(),
            frontier_history: vec![initial.current_opening_date_index],
            daily_completed: 0,
            daily_missed: 0,
            daily_unavailable: 0,
            daily_early_unlocks: 0,
            daily_repeat_offers: 0,
            reload_mismatches: 0,
            final_attempts: 0,
            final_verdict: None,
            completion_total: catalog.completion_total(),
            last_date_index: catalog.last_date_index().unwrap_or_default(),
            final_state: initial.clone(),
            persisted_matches: true,
        }
    }

    #[must_use]
    pub fn regular_passed(&self, catalog: &Catalog) -> usize {
        metro_game::passed_regular_count(catalog, &self.final_state)
    }

    /// Short human-readable digest for failure messages.
    #[must_use]
    pub fn describe(&self) -> String {
        let last_pass = self.passes.last().map_or_else(
            || "none".to_string(),
            |pass| {
                format!(
                    "{} on day {} after {} attempt(s)",
                    pass.station_id,
                    pass.day + 1,
                    pass.attempts
                )
            },
        );
        format!(
            "seed {} | days {} | passes {} | attempts {} (failed {}) | frontier {} | daily {}/{} | final {:?} | last pass {}",
            self.seed,
            self.days_played,
            self.passes.len(),
            self.quiz_attempts,
            self.failed_attempts,
            self.final_state.current_opening_date_index,
            self.daily_completed,
            self.daily_completed + self.daily_missed,
            self.final_verdict,
            last_pass
        )
    }
}

/// Drives a [`MetroEngine`] through simulated days of play.
pub struct CampaignSimulation<'a> {
    catalog: &'a Catalog,
    verbose: bool,
}

impl<'a> CampaignSimulation<'a> {
    #[must_use]
    pub const fn new(catalog: &'a Catalog, verbose: bool) -> Self {
        Self { catalog, verbose }
    }

    #[must_use]
    pub fn run(&self, plan: &SimulationPlan, seed: u64) -> SimulationSummary {
        let clock = Rc::new(ManualClock::new(plan.start_date));
        let store = MemoryStore::new();
        let mut engine = self.open(&store, &clock);
        let mut content_rng = ChaCha20Rng::seed_from_u64(seed);
        let mut player = SimulatedPlayer::new(plan.accuracy, seed ^ PLAYER_STREAM);

        log::debug!("seed {seed}: player accuracy {:.2}", player.accuracy());
        engine.complete_onboarding();
        let mut summary = SimulationSummary::new(seed, self.catalog, engine.state());

        for day in 0..plan.max_days {
            summary.days_played = day + 1;

            for _ in 0..plan.quizzes_per_day {
                let candidates: Vec<String> = engine
                    .map_snapshot()
                    .available
                    .into_iter()
                    .filter(|id| !engine.state().is_station_passed(id))
                    .collect();
                let Some(station_id) = player.pick_station(&candidates) else {
                    break;
                };
                Self::play_station(
                    &mut engine,
                    &station_id,
                    day,
                    &mut player,
                    &mut content_rng,
                    &mut summary,
                );
            }

            if plan.daily_missions {
                Self::play_daily(&mut engine, &mut player, &mut content_rng, &mut summary);
            }

            if plan.final_quiz && engine.final_quiz_available() {
                summary.final_attempts += 1;
                if let Some(verdict) =
                    Self::play_final(&mut engine, &mut player, &mut content_rng)
                {
                    summary.final_verdict = Some(verdict);
                }
            }

            if plan.reopen_each_day {
                let reopened = self.open(&store, &clock);
                if reopened.state() != engine.state() {
                    summary.reload_mismatches += 1;
                    log::warn!("day {day}: reopened state differs from live state");
                }
                engine = reopened;
            }

            if self.verbose {
                log::info!(
                    "day {} | passed {} | frontier {}",
                    day + 1,
                    engine.state().passed_stations.len(),
                    engine.state().current_opening_date_index
                );
            }

            if engine.state().final_quiz_completed {
                break;
            }
            clock.advance_days(1);
        }

        summary.persisted_matches = &StateRepository::new(store).load() == engine.state();
        summary.final_state = engine.state().clone();
        summary
    }

    fn open(&self, store: &MemoryStore, clock: &Rc<ManualClock>) -> SimEngine {
        MetroEngine::with_catalog(self.catalog.clone(), store.clone(), Rc::clone(clock))
    }

    fn play_station(
        engine: &mut SimEngine,
        station_id: &str,
        day: u32,
        player: &mut SimulatedPlayer,
        rng: &mut ChaCha20Rng,
        summary: &mut SimulationSummary,
    ) {
        let Some(mut controller) = engine.start_station_quiz(station_id, rng) else {
            return;
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            summary.quiz_attempts += 1;
            let verdict = answer_all(&mut controller, player, |answer| {
                engine.record_station_answer(station_id, answer);
            });

            match verdict {
                Some(Verdict::Passed) => {
                    let index_before = engine.state().current_opening_date_index;
                    let advanced = engine.finish_station_quiz(station_id, Verdict::Passed);
                    let index_after = engine.state().current_opening_date_index;
                    if advanced {
                        summary.frontier_history.push(index_after);
                    }
                    summary.passes.push(PassRecord {
                        station_id: station_id.to_string(),
                        day,
                        attempts,
                        index_before,
                        index_after,
                        errors_after: engine.state().quiz_errors(station_id),
                    });
                    return;
                }
                Some(Verdict::Failed) => {
                    summary.failed_attempts += 1;
                    engine.finish_station_quiz(station_id, Verdict::Failed);
                    if attempts >= ATTEMPTS_PER_VISIT {
                        return;
                    }
                    engine.retry_station_quiz(station_id, &mut controller, rng);
                    if controller.session().is_empty() {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    fn play_daily(
        engine: &mut SimEngine,
        player: &mut SimulatedPlayer,
        rng: &mut ChaCha20Rng,
        summary: &mut SimulationSummary,
    ) {
        let passed = engine.state().passed_stations.len();
        match engine.start_daily_mission(rng) {
            Ok(mut mission) => {
                if passed < metro_game::constants::DAILY_MISSION_MIN_PASSED {
                    summary.daily_early_unlocks += 1;
                }
                let choice = player.answer_mission(&mission);
                let Some(outcome) = mission.answer(&choice) else {
                    return;
                };
                engine.finish_daily_mission(outcome);
                match outcome {
                    MissionOutcome::Correct => summary.daily_completed += 1,
                    MissionOutcome::Incorrect => summary.daily_missed += 1,
                }
                if engine.start_daily_mission(rng).is_ok() {
                    summary.daily_repeat_offers += 1;
                }
            }
            Err(DailyMissionError::InsufficientData) => summary.daily_unavailable += 1,
            Err(
                DailyMissionError::Locked { .. }
                | DailyMissionError::AlreadyCompleted
                | DailyMissionError::AlreadyAttempted,
            ) => {}
        }
    }

    fn play_final(
        engine: &mut SimEngine,
        player: &mut SimulatedPlayer,
        rng: &mut ChaCha20Rng,
    ) -> Option<Verdict> {
        let mut controller = engine.start_final_quiz(rng)?;
        let verdict = answer_all(&mut controller, player, |_| {})?;
        engine.finish_final_quiz(verdict);
        Some(verdict)
    }
}

/// Answer questions until a verdict is revealed.
fn answer_all(
    controller: &mut QuizController,
    player: &mut SimulatedPlayer,
    mut on_answer: impl FnMut(metro_game::Answer),
) -> Option<Verdict> {
    loop {
        let option = player.answer(controller.session().current_question()?);
        let answer = controller.select(option);
        on_answer(answer);
        if answer.verdict().is_some() {
            return controller.tick(REVEAL_DELAY);
        }
        if !controller.next() {
            return None;
        }
    }
}
