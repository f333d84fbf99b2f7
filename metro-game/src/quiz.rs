//! Question generation for station quizzes and the final exam.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Station};
use crate::constants::{
    FINAL_QUIZ_LEN, FINAL_QUIZ_MIN_STATIONS, QUIZ_OPTION_COUNT, STATION_QUIZ_LEN,
};

const YEAR_OFFSETS: [i32; 6] = [-7, -3, -1, 2, 5, 9];
const DEPTH_OFFSETS: [f32; 7] = [-12.0, -8.0, -4.0, 4.0, 8.0, 13.0, 21.0];

/// One multiple-choice question. `options[correct_index]` is the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuizQuestion {
    #[must_use]
    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct_index)
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}

/// Assemble a question from the right answer and a pool of candidate wrong
/// answers.
///
/// The pool is filtered to distinct values that differ from `correct`;
/// `None` when fewer than three such values remain.
pub fn build_question<R, I>(
    question: String,
    correct: String,
    pool: I,
    rng: &mut R,
) -> Option<QuizQuestion>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut candidates: Vec<String> = Vec::new();
    for value in pool {
        if value != correct && !candidates.contains(&value) {
            candidates.push(value);
        }
    }
    let needed = QUIZ_OPTION_COUNT - 1;
    if candidates.len() < needed {
        return None;
    }

    let mut options: Vec<String> = candidates
        .choose_multiple(rng, needed)
        .cloned()
        .collect();
    options.push(correct.clone());
    options.shuffle(rng);
    let correct_index = options.iter().position(|o| *o == correct)?;
    Some(QuizQuestion {
        question,
        options,
        correct_index,
    })
}

/// Other stations carrying the same display name (transfer hubs).
fn namesakes<'a>(catalog: &'a Catalog, station: &'a Station) -> impl Iterator<Item = &'a Station> {
    catalog.stations.iter().filter(move |s| s.name == station.name)
}

fn format_depth(depth: f32) -> String {
    format!("{depth} м")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StationTemplate {
    Line,
    Year,
    Architect,
    Depth,
    Fact,
    Description,
    SameLine,
    SameDate,
}

const STATION_TEMPLATES: [StationTemplate; 8] = [
    StationTemplate::Line,
    StationTemplate::Year,
    StationTemplate::Architect,
    StationTemplate::Depth,
    StationTemplate::Fact,
    StationTemplate::Description,
    StationTemplate::SameLine,
    StationTemplate::SameDate,
];

impl StationTemplate {
    fn build<R: Rng + ?Sized>(
        self,
        catalog: &Catalog,
        station: &Station,
        rng: &mut R,
    ) -> Option<QuizQuestion> {
        match self {
            Self::Line => station_to_line(catalog, station, rng),
            Self::Year => station_to_year(catalog, station, rng),
            Self::Architect => station_to_architect(catalog, station, rng),
            Self::Depth => {
                let depth = station.depth?;
                let pool = DEPTH_OFFSETS
                    .iter()
                    .map(|offset| depth + offset)
                    .filter(|d| *d > 0.0)
                    .map(format_depth);
                build_question(
                    format!("Какова глубина заложения станции «{}»?", station.name),
                    format_depth(depth),
                    pool,
                    rng,
                )
            }
            Self::Fact => {
                let fact = station.facts.choose(rng)?;
                build_question(
                    format!(
                        "О какой станции этот факт: «{}»?",
                        mask_station_name(fact, &station.name)
                    ),
                    station.name.clone(),
                    other_station_names(catalog, station),
                    rng,
                )
            }
            Self::Description => {
                if station.description.trim().is_empty() {
                    return None;
                }
                build_question(
                    format!(
                        "Какую станцию описывает этот текст: «{}»?",
                        mask_station_name(&station.description, &station.name)
                    ),
                    station.name.clone(),
                    other_station_names(catalog, station),
                    rng,
                )
            }
            Self::SameLine => {
                let neighbours: Vec<&Station> = catalog
                    .stations_on_line(&station.line)
                    .filter(|s| s.name != station.name)
                    .collect();
                let answer = neighbours.choose(rng)?;
                let on_line: Vec<&str> = catalog
                    .stations_on_line(&station.line)
                    .map(|s| s.name.as_str())
                    .collect();
                let pool = catalog
                    .stations
                    .iter()
                    .filter(|s| !on_line.contains(&s.name.as_str()))
                    .map(|s| s.name.clone());
                build_question(
                    format!(
                        "Какая станция находится на одной линии со станцией «{}»?",
                        station.name
                    ),
                    answer.name.clone(),
                    pool,
                    rng,
                )
            }
            Self::SameDate => {
                let peers: Vec<&Station> = catalog
                    .stations_opened_on(&station.opened_date)
                    .filter(|s| s.name != station.name)
                    .collect();
                let answer = peers.choose(rng)?;
                let opened_together: Vec<&str> = catalog
                    .stations_opened_on(&station.opened_date)
                    .map(|s| s.name.as_str())
                    .collect();
                let pool = catalog
                    .stations
                    .iter()
                    .filter(|s| !opened_together.contains(&s.name.as_str()))
                    .map(|s| s.name.clone());
                build_question(
                    format!(
                        "Какая станция открылась в один день со станцией «{}»?",
                        station.name
                    ),
                    answer.name.clone(),
                    pool,
                    rng,
                )
            }
        }
    }
}

const NAME_STEM_LEN: usize = 5;
const NAME_MASK: &str = "…";

fn fold_case(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

/// Hide every word of `text` that shares a stem with a word of `name`, so a
/// quoted fact cannot give away its own station. Stems are the first five
/// letters of each name word of four letters or more, which also catches
/// inflected forms ("Динамо", "Кузьминках").
fn mask_station_name(text: &str, name: &str) -> String {
    let folded = fold_case(name);
    let stems: Vec<String> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 4)
        .map(|word| word.chars().take(NAME_STEM_LEN).collect())
        .collect();

    let mut masked = String::with_capacity(text.len());
    let mut word = String::new();
    let flush = |word: &mut String, masked: &mut String| {
        if word.is_empty() {
            return;
        }
        let folded = fold_case(word);
        if stems.iter().any(|stem| folded.contains(stem.as_str())) {
            masked.push_str(NAME_MASK);
        } else {
            masked.push_str(word);
        }
        word.clear();
    };
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            word.push(ch);
        } else {
            flush(&mut word, &mut masked);
            masked.push(ch);
        }
    }
    flush(&mut word, &mut masked);
    masked
}

fn other_station_names<'a>(
    catalog: &'a Catalog,
    station: &'a Station,
) -> impl Iterator<Item = String> + 'a {
    catalog
        .stations
        .iter()
        .filter(move |s| s.name != station.name)
        .map(|s| s.name.clone())
}

fn station_to_line<R: Rng + ?Sized>(
    catalog: &Catalog,
    station: &Station,
    rng: &mut R,
) -> Option<QuizQuestion> {
    let taken: Vec<&str> = namesakes(catalog, station)
        .map(|s| s.line.as_str())
        .collect();
    let pool = catalog
        .lines
        .iter()
        .filter(|line| !taken.contains(&line.id.as_str()))
        .map(|line| line.name.clone());
    build_question(
        format!("На какой линии находится станция «{}»?", station.name),
        catalog.line_name(station).to_string(),
        pool,
        rng,
    )
}

fn station_to_year<R: Rng + ?Sized>(
    catalog: &Catalog,
    station: &Station,
    rng: &mut R,
) -> Option<QuizQuestion> {
    let year: i32 = station.opening_year().parse().ok()?;
    let taken: Vec<&str> = namesakes(catalog, station)
        .map(Station::opening_year)
        .collect();
    let mut pool: Vec<String> = catalog
        .stations
        .iter()
        .map(|s| s.opening_year().to_string())
        .filter(|y| !taken.contains(&y.as_str()))
        .collect();
    pool.sort_unstable();
    pool.dedup();
    if pool.len() < QUIZ_OPTION_COUNT - 1 {
        pool.extend(
            YEAR_OFFSETS
                .iter()
                .map(|offset| (year + offset).to_string())
                .filter(|y| !taken.contains(&y.as_str())),
        );
    }
    build_question(
        format!("В каком году открылась станция «{}»?", station.name),
        year.to_string(),
        pool,
        rng,
    )
}

fn station_to_architect<R: Rng + ?Sized>(
    catalog: &Catalog,
    station: &Station,
    rng: &mut R,
) -> Option<QuizQuestion> {
    let architect = station.architect.as_ref()?;
    let pool = catalog
        .stations
        .iter()
        .filter_map(|s| s.architect.clone());
    build_question(
        format!("Кто автор архитектурного проекта станции «{}»?", station.name),
        architect.clone(),
        pool,
        rng,
    )
}

fn line_to_station<R: Rng + ?Sized>(
    catalog: &Catalog,
    station: &Station,
    rng: &mut R,
) -> Option<QuizQuestion> {
    let on_line: Vec<&str> = catalog
        .stations_on_line(&station.line)
        .map(|s| s.name.as_str())
        .collect();
    let pool = catalog
        .stations
        .iter()
        .filter(|s| !on_line.contains(&s.name.as_str()))
        .map(|s| s.name.clone());
    build_question(
        format!(
            "Какая из этих станций находится на линии «{}»?",
            catalog.line_name(station)
        ),
        station.name.clone(),
        pool,
        rng,
    )
}

/// Up to [`STATION_QUIZ_LEN`] questions about one station.
///
/// Templates are tried in a fixed priority order (line, opening year,
/// architect, depth, fact, description, same-line neighbour, same-date
/// neighbour); each contributes at most one question. A station always gets
/// the same number of questions for a given catalog, only the wording of
/// distractors and the option order vary between attempts.
pub fn generate_quiz_for_station<R: Rng + ?Sized>(
    catalog: &Catalog,
    station: &Station,
    rng: &mut R,
) -> Vec<QuizQuestion> {
    let questions: Vec<QuizQuestion> = STATION_TEMPLATES
        .iter()
        .filter_map(|template| template.build(catalog, station, rng))
        .take(STATION_QUIZ_LEN)
        .collect();
    if questions.len() < STATION_QUIZ_LEN {
        log::debug!(
            "station {} yields only {} quiz questions",
            station.id,
            questions.len()
        );
    }
    questions
}

#[derive(Debug, Clone, Copy)]
enum FinalTemplate {
    StationToLine,
    StationToYear,
    LineToStation,
    Architect,
}

const FINAL_TEMPLATES: [FinalTemplate; 4] = [
    FinalTemplate::StationToLine,
    FinalTemplate::StationToYear,
    FinalTemplate::LineToStation,
    FinalTemplate::Architect,
];

impl FinalTemplate {
    fn build<R: Rng + ?Sized>(
        self,
        catalog: &Catalog,
        station: &Station,
        rng: &mut R,
    ) -> Option<QuizQuestion> {
        match self {
            Self::StationToLine => station_to_line(catalog, station, rng),
            Self::StationToYear => station_to_year(catalog, station, rng),
            Self::LineToStation => line_to_station(catalog, station, rng),
            Self::Architect => station_to_architect(catalog, station, rng),
        }
    }
}

/// Question count of the final quiz for `passed_regular` passed stations.
#[must_use]
pub fn final_quiz_len(passed_regular: usize) -> usize {
    if passed_regular < FINAL_QUIZ_MIN_STATIONS {
        0
    } else {
        passed_regular.min(FINAL_QUIZ_LEN)
    }
}

/// The final exam: one question per sampled passed station, rotating through
/// cross-cutting templates. Special-line stations and unknown ids are
/// ignored. Empty when fewer than two regular stations are passed.
pub fn generate_final_quiz_questions<R, S>(
    catalog: &Catalog,
    passed_ids: &[S],
    rng: &mut R,
) -> Vec<QuizQuestion>
where
    R: Rng + ?Sized,
    S: AsRef<str>,
{
    let passed: Vec<&Station> = catalog
        .regular_stations()
        .filter(|s| passed_ids.iter().any(|id| id.as_ref() == s.id))
        .collect();
    let count = final_quiz_len(passed.len());
    if count == 0 {
        return Vec::new();
    }

    let sampled: Vec<&Station> = passed.choose_multiple(rng, count).copied().collect();
    let mut questions = Vec::with_capacity(count);
    for (slot, station) in sampled.into_iter().enumerate() {
        let question = (0..FINAL_TEMPLATES.len())
            .map(|shift| FINAL_TEMPLATES[(slot + shift) % FINAL_TEMPLATES.len()])
            .find_map(|template| template.build(catalog, station, rng));
        match question {
            Some(question) => questions.push(question),
            None => log::warn!("no final quiz template fits station {}", station.id),
        }
    }
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashSet;

    fn rng(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    fn assert_well_formed(question: &QuizQuestion) {
        assert_eq!(question.options.len(), QUIZ_OPTION_COUNT, "{question:?}");
        assert!(question.correct_index < question.options.len());
        let distinct: HashSet<&String> = question.options.iter().collect();
        assert_eq!(distinct.len(), question.options.len(), "{question:?}");
    }

    #[test]
    fn build_question_rejects_thin_pools() {
        let mut rng = rng(1);
        let pool = vec!["A".to_string(), "A".to_string(), "B".to_string(), "C".to_string()];
        assert!(build_question("?".into(), "C".into(), pool, &mut rng).is_none());

        let pool = ["A", "B", "C", "D", "E"].map(String::from);
        let question = build_question("?".into(), "C".into(), pool, &mut rng).unwrap();
        assert_well_formed(&question);
        assert_eq!(question.correct_answer(), "C");
    }

    #[test]
    fn correct_position_varies_across_attempts() {
        let pool = ["A", "B", "C", "D", "E", "F"].map(String::from);
        let mut rng = rng(7);
        let positions: HashSet<usize> = (0..40)
            .filter_map(|_| build_question("?".into(), "Z".into(), pool.clone(), &mut rng))
            .map(|q| q.correct_index)
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn every_bundled_station_gets_full_quiz() {
        let catalog = Catalog::bundled();
        let mut rng = rng(42);
        for station in &catalog.stations {
            let quiz = generate_quiz_for_station(catalog, station, &mut rng);
            assert_eq!(quiz.len(), STATION_QUIZ_LEN, "station {}", station.id);
            let texts: HashSet<&String> = quiz.iter().map(|q| &q.question).collect();
            assert_eq!(texts.len(), quiz.len(), "distinct attributes");
            quiz.iter().for_each(assert_well_formed);
        }
    }

    #[test]
    fn station_quizzes_never_quote_their_answer() {
        let catalog = Catalog::bundled();
        for seed in 0..8 {
            let mut rng = rng(seed);
            for station in &catalog.stations {
                for question in generate_quiz_for_station(catalog, station, &mut rng) {
                    assert!(
                        !question.question.contains(question.correct_answer()),
                        "{}: {}",
                        station.id,
                        question.question
                    );
                }
            }
        }
    }

    #[test]
    fn name_mask_covers_inflected_forms() {
        assert_eq!(
            mask_station_name("Станция у стадиона «Динамо», рядом парк.", "Динамо"),
            "Станция у стадиона «…», рядом парк."
        );
        assert_eq!(
            mask_station_name("Парк в Кузьминках и усадьба Кузьминки-Люблино", "Кузьминки"),
            "Парк в … и усадьба …-Люблино"
        );
        assert_eq!(
            mask_station_name("Семеновская застава", "Семёновская"),
            "… застава"
        );
        assert_eq!(mask_station_name("у Охотного ряда", "Охотный Ряд"), "у … ряда");
    }

    #[test]
    fn line_question_comes_first_and_is_right() {
        let catalog = Catalog::bundled();
        let sokolniki = catalog.station("sokolniki").unwrap();
        let quiz = generate_quiz_for_station(catalog, sokolniki, &mut rng(3));
        assert!(quiz[0].question.contains("линии"));
        assert_eq!(quiz[0].correct_answer(), catalog.line_name(sokolniki));
        assert!(quiz[1].question.contains("году"));
        assert_eq!(quiz[1].correct_answer(), "1935");
    }

    #[test]
    fn transfer_hub_line_question_is_unambiguous() {
        let catalog = Catalog::bundled();
        let hub = catalog
            .stations
            .iter()
            .find(|s| namesakes(catalog, s).count() > 1)
            .unwrap();
        let sibling_lines: Vec<&str> = namesakes(catalog, hub)
            .filter(|s| s.id != hub.id)
            .map(|s| catalog.line_name(s))
            .collect();
        for seed in 0..20 {
            let question = station_to_line(catalog, hub, &mut rng(seed)).unwrap();
            for line in &sibling_lines {
                assert!(!question.options.iter().any(|o| o == line));
            }
        }
    }

    #[test]
    fn final_quiz_size_tracks_passed_count() {
        let catalog = Catalog::bundled();
        let ids: Vec<&str> = catalog.regular_stations().map(|s| s.id.as_str()).collect();
        let mut rng = rng(9);

        assert!(generate_final_quiz_questions(catalog, &ids[..1], &mut rng).is_empty());
        assert_eq!(generate_final_quiz_questions(catalog, &ids[..2], &mut rng).len(), 2);
        assert_eq!(generate_final_quiz_questions(catalog, &ids[..7], &mut rng).len(), 7);

        let full = generate_final_quiz_questions(catalog, &ids, &mut rng);
        assert_eq!(full.len(), FINAL_QUIZ_LEN);
        full.iter().for_each(assert_well_formed);
    }

    #[test]
    fn final_quiz_ignores_special_and_unknown_ids() {
        let catalog = Catalog::bundled();
        let ids = ["teletsentr", "atlantis", "sokolniki"];
        assert!(generate_final_quiz_questions(catalog, &ids, &mut rng(5)).is_empty());
        assert_eq!(final_quiz_len(1), 0);
        assert_eq!(final_quiz_len(30), FINAL_QUIZ_LEN);
    }

    #[test]
    fn same_seed_same_quiz() {
        let catalog = Catalog::bundled();
        let station = catalog.station("sokolniki").unwrap();
        let first = generate_quiz_for_station(catalog, station, &mut rng(11));
        let second = generate_quiz_for_station(catalog, station, &mut rng(11));
        assert_eq!(first, second);
    }
}
