//! Popup content for a station: the long description and the fact list.
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Station};
use crate::constants::{DISPLAY_DUPLICATE_PREFIX, DISPLAY_MAX_FACTS};

const GENERAL_FACTS: [&str; 2] = [
    "Московский метрополитен считается одним из красивейших в мире.",
    "Многие станции признаны памятниками архитектуры.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationDisplay {
    pub description: String,
    pub facts: Vec<String>,
}

/// Build the popup text for `station`.
///
/// Hand-written extended content wins when both parts are present. Otherwise
/// the base description is padded with catalog-derived notes and the fact
/// list grows with generated facts that do not repeat an existing one.
#[must_use]
pub fn station_display_data(catalog: &Catalog, station: &Station) -> StationDisplay {
    if let (Some(description), Some(facts)) =
        (&station.extended_description, &station.extended_facts)
    {
        return StationDisplay {
            description: description.clone(),
            facts: facts.clone(),
        };
    }

    let line_name = catalog
        .line(&station.line)
        .map_or("метро", |line| line.name.as_str());
    let year = station.opening_year();

    let mut description = station.description.clone();
    if let Some(depth) = station.depth {
        description.push_str(&format!(" Глубина заложения: {depth} м."));
    }
    description.push_str(
        "\n\nСтанция входит в Московский метрополитен, одну из крупнейших систем метро в мире. \
         Первая линия открылась 15 мая 1935 года. ",
    );
    if let Some(architect) = &station.architect {
        description.push_str(&format!("Архитектурное решение: {architect}. "));
    }
    description.push_str("Станции отличаются монументальностью и разнообразием стилей.");

    let mut generated = vec![
        format!("Входит в состав линии «{line_name}»."),
        format!("Открыта в {year} году."),
    ];
    if let Some(architect) = &station.architect {
        generated.push(format!("Архитектор: {architect}."));
    }
    generated.extend(GENERAL_FACTS.iter().map(|fact| (*fact).to_string()));

    let mut facts = station.facts.clone();
    for fact in generated {
        if facts.len() >= DISPLAY_MAX_FACTS {
            break;
        }
        if !facts.iter().any(|existing| near_duplicate(existing, &fact)) {
            facts.push(fact);
        }
    }

    StationDisplay { description, facts }
}

fn prefix(text: &str) -> &str {
    text.char_indices()
        .nth(DISPLAY_DUPLICATE_PREFIX)
        .map_or(text, |(end, _)| &text[..end])
}

fn near_duplicate(existing: &str, candidate: &str) -> bool {
    existing.contains(prefix(candidate)) || candidate.contains(prefix(existing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_content_is_returned_verbatim() {
        let catalog = Catalog::bundled();
        let sokolniki = catalog.station("sokolniki").unwrap();
        let display = station_display_data(catalog, sokolniki);
        assert_eq!(
            Some(&display.description),
            sokolniki.extended_description.as_ref()
        );
        assert_eq!(Some(&display.facts), sokolniki.extended_facts.as_ref());
    }

    #[test]
    fn generated_facts_extend_base_list() {
        let catalog = Catalog::bundled();
        let mut station = catalog.station("sokolniki").unwrap().clone();
        station.extended_description = None;
        station.architect = Some("И. Г. Тарановский".to_string());
        station.depth = Some(9.0);
        station.facts = vec!["Первая станция в списке.".to_string()];

        let display = station_display_data(catalog, &station);
        assert!(display.description.starts_with(&station.description));
        assert!(display.description.contains("Глубина заложения: 9 м."));
        assert!(display.description.contains("Тарановский"));
        assert_eq!(display.facts[0], "Первая станция в списке.");
        assert!(display.facts.contains(&"Открыта в 1935 году.".to_string()));
        assert!(display.facts.iter().any(|f| f.starts_with("Архитектор")));
        assert_eq!(display.facts.len(), 6);
    }

    #[test]
    fn near_duplicates_are_skipped_and_list_is_capped() {
        let catalog = Catalog::bundled();
        let mut station = catalog.station("sokolniki").unwrap().clone();
        station.extended_facts = None;
        station.architect = None;
        station.facts = vec!["Открыта в 1935 году вместе с первой очередью.".to_string()];
        let display = station_display_data(catalog, &station);
        assert_eq!(
            display
                .facts
                .iter()
                .filter(|f| f.starts_with("Открыта в"))
                .count(),
            1
        );

        station.facts = (0..DISPLAY_MAX_FACTS).map(|i| format!("Факт номер {i:02}")).collect();
        let display = station_display_data(catalog, &station);
        assert_eq!(display.facts.len(), DISPLAY_MAX_FACTS);
    }
}
