//! Quiz attempt state machine and its timed verdict reveal.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{FINAL_QUIZ_ERROR_TOLERANCE, REVEAL_DELAY, STATION_QUIZ_ERROR_TOLERANCE};
use crate::quiz::QuizQuestion;
use crate::timer::{TimerHandle, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizKind {
    Station,
    Final,
}

impl QuizKind {
    /// Wrong answers that end an attempt as failed.
    #[must_use]
    pub const fn error_tolerance(self) -> u32 {
        match self {
            Self::Station => STATION_QUIZ_ERROR_TOLERANCE,
            Self::Final => FINAL_QUIZ_ERROR_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizPhase {
    Playing,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Passed,
    Failed,
}

impl From<Verdict> for QuizPhase {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => Self::Passed,
            Verdict::Failed => Self::Failed,
        }
    }
}

/// Result of one option selection. `verdict` is set when this answer decided
/// the attempt; the phase only changes once the verdict is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Ignored,
    Correct { verdict: Option<Verdict> },
    Incorrect { verdict: Option<Verdict> },
}

impl Answer {
    #[must_use]
    pub const fn verdict(self) -> Option<Verdict> {
        match self {
            Self::Ignored => None,
            Self::Correct { verdict } | Self::Incorrect { verdict } => verdict,
        }
    }

    #[must_use]
    pub const fn is_incorrect(self) -> bool {
        matches!(self, Self::Incorrect { .. })
    }
}

/// One attempt at a station or final quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    kind: QuizKind,
    questions: Vec<QuizQuestion>,
    current: usize,
    selected: Option<usize>,
    answered: bool,
    errors: u32,
    correct: u32,
    phase: QuizPhase,
    pending: Option<Verdict>,
    attempt: u32,
}

impl QuizSession {
    #[must_use]
    pub const fn new(kind: QuizKind, questions: Vec<QuizQuestion>) -> Self {
        Self::with_attempt(kind, questions, 1)
    }

    const fn with_attempt(kind: QuizKind, questions: Vec<QuizQuestion>, attempt: u32) -> Self {
        Self {
            kind,
            questions,
            current: 0,
            selected: None,
            answered: false,
            errors: 0,
            correct: 0,
            phase: QuizPhase::Playing,
            pending: None,
            attempt,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> QuizKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub const fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub const fn is_answered(&self) -> bool {
        self.answered
    }

    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    #[must_use]
    pub const fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub const fn phase(&self) -> QuizPhase {
        self.phase
    }

    /// Verdict decided but not yet revealed.
    #[must_use]
    pub const fn pending_verdict(&self) -> Option<Verdict> {
        self.pending
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    fn is_last(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    /// Submit an option for the current question.
    ///
    /// Ignored when the question was already answered, the attempt is
    /// decided, or `option` is out of range.
    pub fn select(&mut self, option: usize) -> Answer {
        if self.phase != QuizPhase::Playing || self.answered || self.pending.is_some() {
            return Answer::Ignored;
        }
        let Some(question) = self.questions.get(self.current) else {
            return Answer::Ignored;
        };
        if option >= question.options.len() {
            return Answer::Ignored;
        }

        let is_correct = question.is_correct(option);
        self.selected = Some(option);
        self.answered = true;
        if is_correct {
            self.correct += 1;
        } else {
            self.errors += 1;
        }

        let verdict = if self.errors >= self.kind.error_tolerance() {
            Some(Verdict::Failed)
        } else if self.is_last() {
            Some(Verdict::Passed)
        } else {
            None
        };
        self.pending = verdict;

        if is_correct {
            Answer::Correct { verdict }
        } else {
            Answer::Incorrect { verdict }
        }
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.phase == QuizPhase::Playing
            && self.answered
            && self.pending.is_none()
            && !self.is_last()
    }

    /// Move to the next question. Returns `false` when not allowed.
    pub fn next(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.current += 1;
        self.selected = None;
        self.answered = false;
        true
    }

    /// Apply a revealed verdict. Returns `false` if it does not match the
    /// pending one.
    pub fn conclude(&mut self, verdict: Verdict) -> bool {
        if self.pending != Some(verdict) {
            return false;
        }
        self.pending = None;
        self.phase = verdict.into();
        true
    }

    /// A fresh attempt over new questions with every counter reset.
    #[must_use]
    pub fn retry(&self, questions: Vec<QuizQuestion>) -> Self {
        Self::with_attempt(self.kind, questions, self.attempt + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RevealEvent {
    attempt: u32,
    verdict: Verdict,
}

/// Owns a session plus the timer that reveals its verdict.
#[derive(Debug)]
pub struct QuizController {
    session: QuizSession,
    timers: TimerQueue<RevealEvent>,
    reveal: Option<TimerHandle>,
    delay: Duration,
}

impl QuizController {
    #[must_use]
    pub fn new(session: QuizSession) -> Self {
        Self::with_delay(session, REVEAL_DELAY)
    }

    #[must_use]
    pub fn with_delay(session: QuizSession, delay: Duration) -> Self {
        Self {
            session,
            timers: TimerQueue::new(),
            reveal: None,
            delay,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub const fn phase(&self) -> QuizPhase {
        self.session.phase
    }

    #[must_use]
    pub fn has_pending_reveal(&self) -> bool {
        self.reveal.is_some_and(|handle| self.timers.is_pending(handle))
    }

    pub fn select(&mut self, option: usize) -> Answer {
        let answer = self.session.select(option);
        if let Some(verdict) = answer.verdict() {
            let event = RevealEvent {
                attempt: self.session.attempt,
                verdict,
            };
            self.reveal = Some(self.timers.schedule(self.delay, event));
        }
        answer
    }

    pub fn next(&mut self) -> bool {
        self.session.next()
    }

    /// Let time pass. Returns the verdict if it was revealed during this tick.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Verdict> {
        let mut revealed = None;
        for event in self.timers.advance(elapsed) {
            if event.attempt != self.session.attempt {
                log::debug!("discarding reveal from attempt {}", event.attempt);
                continue;
            }
            if self.session.conclude(event.verdict) {
                self.reveal = None;
                revealed = Some(event.verdict);
            }
        }
        revealed
    }

    /// Start over with new questions; any pending reveal is dropped.
    pub fn retry(&mut self, questions: Vec<QuizQuestion>) {
        self.cancel_reveal();
        self.session = self.session.retry(questions);
    }

    /// Cancel outstanding timers before the controller is discarded.
    pub fn teardown(&mut self) {
        self.cancel_reveal();
        self.timers.clear();
    }

    fn cancel_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            self.timers.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            question: format!("Q{correct}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: correct,
        }
    }

    fn questions(n: usize) -> Vec<QuizQuestion> {
        (0..n).map(|_| question(0)).collect()
    }

    /// Answer every question, wrong where `wrong[i]`, and return the phase.
    fn play(kind: QuizKind, wrong: &[bool]) -> QuizPhase {
        let mut controller = QuizController::new(QuizSession::new(kind, questions(wrong.len())));
        for &miss in wrong {
            let answer = controller.select(usize::from(miss));
            if answer.verdict().is_some() {
                break;
            }
            assert!(controller.next());
        }
        assert_eq!(controller.phase(), QuizPhase::Playing);
        controller.tick(REVEAL_DELAY);
        controller.phase()
    }

    #[test]
    fn second_station_error_fails_regardless_of_position() {
        assert_eq!(
            play(QuizKind::Station, &[true, true, false, false, false]),
            QuizPhase::Failed
        );
        assert_eq!(
            play(QuizKind::Station, &[false, false, false, true, true]),
            QuizPhase::Failed
        );
        assert_eq!(
            play(QuizKind::Station, &[false, true, false, false, false]),
            QuizPhase::Passed
        );
        assert_eq!(play(QuizKind::Station, &[false; 5]), QuizPhase::Passed);
    }

    #[test]
    fn final_quiz_tolerates_two_errors() {
        let mut pattern = [false; 10];
        pattern[0] = true;
        pattern[9] = true;
        assert_eq!(play(QuizKind::Final, &pattern), QuizPhase::Passed);
        pattern[4] = true;
        assert_eq!(play(QuizKind::Final, &pattern), QuizPhase::Failed);
    }

    #[test]
    fn answered_question_ignores_clicks_and_never_auto_advances() {
        let mut session = QuizSession::new(QuizKind::Station, questions(3));
        assert!(!session.can_advance());
        assert_eq!(session.select(0), Answer::Correct { verdict: None });
        assert_eq!(session.select(1), Answer::Ignored);
        assert_eq!(session.correct(), 1);
        assert_eq!(session.errors(), 0);
        assert_eq!(session.current_index(), 0, "no automatic advance");
        assert!(session.next());
        assert_eq!(session.selected(), None);
        assert!(!session.is_answered());
    }

    #[test]
    fn out_of_range_and_empty_are_ignored() {
        let mut session = QuizSession::new(QuizKind::Station, questions(2));
        assert_eq!(session.select(4), Answer::Ignored);
        assert!(!session.is_answered());

        let mut empty = QuizSession::new(QuizKind::Final, Vec::new());
        assert_eq!(empty.select(0), Answer::Ignored);
        assert!(!empty.next());
    }

    #[test]
    fn verdict_waits_for_reveal_delay() {
        let mut controller = QuizController::new(QuizSession::new(QuizKind::Station, questions(1)));
        let answer = controller.select(0);
        assert_eq!(answer.verdict(), Some(Verdict::Passed));
        assert!(controller.has_pending_reveal());
        assert_eq!(controller.tick(REVEAL_DELAY - Duration::from_millis(1)), None);
        assert_eq!(controller.phase(), QuizPhase::Playing);
        assert_eq!(controller.tick(Duration::from_millis(1)), Some(Verdict::Passed));
        assert_eq!(controller.phase(), QuizPhase::Passed);
    }

    #[test]
    fn teardown_cancels_pending_verdict() {
        let mut controller = QuizController::new(QuizSession::new(QuizKind::Station, questions(2)));
        controller.select(1);
        assert!(controller.next());
        controller.select(1);
        assert!(controller.has_pending_reveal());
        controller.teardown();
        assert!(!controller.has_pending_reveal());
        assert_eq!(controller.tick(REVEAL_DELAY * 2), None);
        assert_eq!(controller.phase(), QuizPhase::Playing);
    }

    #[test]
    fn retry_resets_counters_and_discards_stale_reveal() {
        let mut controller = QuizController::new(QuizSession::new(QuizKind::Station, questions(3)));
        controller.select(1);
        controller.next();
        controller.select(1);
        controller.retry(questions(4));
        assert_eq!(controller.tick(REVEAL_DELAY), None);

        let session = controller.session();
        assert_eq!(session.attempt(), 2);
        assert_eq!(session.len(), 4);
        assert_eq!(session.errors(), 0);
        assert_eq!(session.correct(), 0);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.phase(), QuizPhase::Playing);
    }

    #[test]
    fn error_tolerances() {
        assert_eq!(QuizKind::Station.error_tolerance(), 2);
        assert_eq!(QuizKind::Final.error_tolerance(), 3);
    }
}
