//! Moscow Metro Explorer Engine
//!
//! Platform-agnostic progression and quiz rules for the Moscow Metro
//! educational game. Rendering, sound and packaging live in the host; this
//! crate owns the catalog, the persisted player state, quiz generation, the
//! quiz state machine and daily missions.

pub mod catalog;
pub mod clock;
pub mod constants;
pub mod daily;
pub mod display;
pub mod progression;
pub mod quiz;
pub mod session;
pub mod state;
pub mod storage;
pub mod timer;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, Line, MetroTrain, Station};
pub use clock::{Clock, LocalClock, ManualClock, date_key, parse_date_key};
pub use daily::{
    DailyMission, DailyMissionError, DailyStatus, MissionKind, MissionOption, MissionOutcome,
    RewardLevel, apply_mission_outcome, daily_reward_level, daily_status, next_reward_threshold,
    select_daily_mission,
};
pub use display::{StationDisplay, station_display_data};
pub use progression::{
    MapSnapshot, ProgressSummary, apply_station_pass, available_station_ids, available_stations,
    final_quiz_available, frontier_complete, is_station_available, map_snapshot,
    passed_regular_count, progress_summary, station_date_index,
};
pub use quiz::{
    QuizQuestion, build_question, final_quiz_len, generate_final_quiz_questions,
    generate_quiz_for_station,
};
pub use session::{Answer, QuizController, QuizKind, QuizPhase, QuizSession, Verdict};
pub use state::GameState;
pub use storage::{
    FileStore, KeyValueStore, MemoryStore, StateRepository, StorageError, decode_state,
    encode_state, migrate_state,
};
pub use timer::{TimerHandle, TimerQueue};

use chrono::NaiveDate;
use rand::Rng;

/// Main engine tying the catalog, the persisted state and the clock together.
///
/// The in-memory state is authoritative. Every transition is written through
/// the repository; a failed write is logged and play continues.
pub struct MetroEngine<S, C = LocalClock>
where
    S: KeyValueStore,
    C: Clock,
{
    catalog: Catalog,
    repository: StateRepository<S>,
    state: GameState,
    clock: C,
}

impl<S: KeyValueStore> MetroEngine<S, LocalClock> {
    /// Open the bundled catalog over `store` using the local calendar.
    pub fn open(store: S) -> Self {
        Self::with_catalog(Catalog::bundled().clone(), store, LocalClock)
    }
}

impl<S, C> MetroEngine<S, C>
where
    S: KeyValueStore,
    C: Clock,
{
    /// Load whatever `store` holds and reconcile it with `catalog`.
    pub fn with_catalog(catalog: Catalog, store: S, clock: C) -> Self {
        let repository = StateRepository::new(store);
        let state = repository.load().sanitize(&catalog);
        Self {
            catalog,
            repository,
            state,
            clock,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn repository(&self) -> &StateRepository<S> {
        &self.repository
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    #[must_use]
    pub fn map_snapshot(&self) -> MapSnapshot {
        map_snapshot(&self.catalog, &self.state)
    }

    #[must_use]
    pub fn progress_summary(&self) -> ProgressSummary {
        progress_summary(&self.catalog, &self.state)
    }

    #[must_use]
    pub fn station_display(&self, station_id: &str) -> Option<StationDisplay> {
        self.catalog
            .station(station_id)
            .map(|station| station_display_data(&self.catalog, station))
    }

    #[must_use]
    pub fn is_station_available(&self, station_id: &str) -> bool {
        self.catalog
            .station(station_id)
            .is_some_and(|station| is_station_available(&self.catalog, &self.state, station))
    }

    fn commit(&mut self, next: GameState) {
        if next == self.state {
            return;
        }
        self.state = next;
        if let Err(err) = self.repository.save(&self.state) {
            log::error!("Failed to persist game state: {err}");
        }
    }

    /// Fresh questions for an available station; empty otherwise.
    pub fn station_quiz_questions<R: Rng + ?Sized>(
        &self,
        station_id: &str,
        rng: &mut R,
    ) -> Vec<QuizQuestion> {
        match self.catalog.station(station_id) {
            Some(station) if is_station_available(&self.catalog, &self.state, station) => {
                generate_quiz_for_station(&self.catalog, station, rng)
            }
            _ => Vec::new(),
        }
    }

    /// Open a quiz for a station. `None` when the station is unknown, still
    /// locked, or has no questions.
    pub fn start_station_quiz<R: Rng + ?Sized>(
        &self,
        station_id: &str,
        rng: &mut R,
    ) -> Option<QuizController> {
        let questions = self.station_quiz_questions(station_id, rng);
        if questions.is_empty() {
            return None;
        }
        Some(QuizController::new(QuizSession::new(
            QuizKind::Station,
            questions,
        )))
    }

    /// Track a station quiz answer; wrong answers bump the station's counter.
    pub fn record_station_answer(&mut self, station_id: &str, answer: Answer) {
        if answer.is_incorrect() {
            let next = self.state.record_quiz_error(station_id);
            self.commit(next);
        }
    }

    /// Start a new attempt at a station quiz, clearing its error counter.
    pub fn retry_station_quiz<R: Rng + ?Sized>(
        &mut self,
        station_id: &str,
        controller: &mut QuizController,
        rng: &mut R,
    ) {
        let next = self.state.reset_quiz_errors(station_id);
        self.commit(next);
        controller.retry(self.station_quiz_questions(station_id, rng));
    }

    /// Apply a revealed station verdict. Returns `true` when the pass moved
    /// the opening-date frontier. Unknown and locked stations are ignored.
    pub fn finish_station_quiz(&mut self, station_id: &str, verdict: Verdict) -> bool {
        if verdict != Verdict::Passed {
            return false;
        }
        if !self.is_station_available(station_id) {
            log::warn!("ignoring pass for unavailable station {station_id}");
            return false;
        }
        let before = self.state.current_opening_date_index;
        let next = apply_station_pass(&self.catalog, &self.state, station_id);
        self.commit(next);
        self.state.current_opening_date_index > before
    }

    #[must_use]
    pub fn final_quiz_available(&self) -> bool {
        final_quiz_available(&self.catalog, &self.state)
    }

    pub fn final_quiz_questions<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<QuizQuestion> {
        generate_final_quiz_questions(&self.catalog, &self.state.passed_stations, rng)
    }

    /// Open the final exam once every regular station is passed.
    pub fn start_final_quiz<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<QuizController> {
        if !self.final_quiz_available() {
            return None;
        }
        let questions = self.final_quiz_questions(rng);
        if questions.is_empty() {
            return None;
        }
        Some(QuizController::new(QuizSession::new(
            QuizKind::Final,
            questions,
        )))
    }

    pub fn finish_final_quiz(&mut self, verdict: Verdict) {
        if verdict == Verdict::Passed {
            let next = self.state.complete_final_quiz();
            self.commit(next);
        }
    }

    #[must_use]
    pub fn daily_status(&self) -> DailyStatus {
        daily_status(&self.state, self.clock.today())
    }

    /// Draw today's mission.
    ///
    /// # Errors
    ///
    /// Returns an error when missions are locked, already done today, or the
    /// catalog cannot supply four options.
    pub fn start_daily_mission<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<DailyMission, DailyMissionError> {
        select_daily_mission(&self.state, &self.catalog, self.clock.today(), rng)
    }

    pub fn finish_daily_mission(&mut self, outcome: MissionOutcome) {
        let next = apply_mission_outcome(&self.state, outcome, self.clock.today());
        self.commit(next);
    }

    pub fn complete_onboarding(&mut self) {
        let next = self.state.complete_onboarding();
        self.commit(next);
    }

    /// Forget all progress, both persisted and in memory.
    pub fn reset(&mut self) {
        if let Err(err) = self.repository.reset() {
            log::error!("Failed to clear saved game state: {err}");
        }
        self.state = GameState::default();
    }
}
