use metro_game::{DailyMission, QuizQuestion};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;

/// A scripted player that answers correctly with a fixed probability.
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    accuracy: f64,
    rng: ChaCha20Rng,
}

impl SimulatedPlayer {
    #[must_use]
    pub fn new(accuracy: f64, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    fn knows_answer(&mut self) -> bool {
        self.rng.gen_bool(self.accuracy)
    }

    /// Option index the player clicks for `question`.
    pub fn answer(&mut self, question: &QuizQuestion) -> usize {
        if self.knows_answer() {
            return question.correct_index;
        }
        let wrong: Vec<usize> = (0..question.options.len())
            .filter(|&i| i != question.correct_index)
            .collect();
        wrong
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(question.correct_index)
    }

    /// Option id the player picks for a daily mission.
    pub fn answer_mission(&mut self, mission: &DailyMission) -> String {
        if self.knows_answer() {
            return mission.target_id.clone();
        }
        mission
            .options
            .iter()
            .filter(|option| option.id != mission.target_id)
            .collect::<Vec<_>>()
            .choose(&mut self.rng)
            .map_or_else(|| mission.target_id.clone(), |option| option.id.clone())
    }

    /// Which map marker to tap next.
    pub fn pick_station(&mut self, candidates: &[String]) -> Option<String> {
        candidates.choose(&mut self.rng).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> QuizQuestion {
        QuizQuestion {
            question: "На какой линии находится станция «Сокольники»?".to_string(),
            options: vec![
                "Сокольническая".to_string(),
                "Замоскворецкая".to_string(),
                "Арбатско-Покровская".to_string(),
                "Кольцевая".to_string(),
            ],
            correct_index: 2,
        }
    }

    #[test]
    fn perfect_player_always_answers_correctly() {
        let mut player = SimulatedPlayer::new(1.0, 7);
        let question = question();
        for _ in 0..50 {
            assert_eq!(player.answer(&question), 2);
        }
    }

    #[test]
    fn clueless_player_never_answers_correctly() {
        let mut player = SimulatedPlayer::new(0.0, 7);
        let question = question();
        for _ in 0..50 {
            let picked = player.answer(&question);
            assert_ne!(picked, 2);
            assert!(picked < 4);
        }
    }

    #[test]
    fn accuracy_is_clamped() {
        assert!((SimulatedPlayer::new(3.0, 1).accuracy() - 1.0).abs() < f64::EPSILON);
        assert!(SimulatedPlayer::new(-1.0, 1).accuracy().abs() < f64::EPSILON);
    }

    #[test]
    fn same_seed_same_choices() {
        let candidates: Vec<String> = ["a", "b", "c", "d"].map(String::from).to_vec();
        let mut first = SimulatedPlayer::new(0.5, 99);
        let mut second = SimulatedPlayer::new(0.5, 99);
        for _ in 0..10 {
            assert_eq!(first.pick_station(&candidates), second.pick_station(&candidates));
        }
        assert!(first.pick_station(&[]).is_none());
    }
}
