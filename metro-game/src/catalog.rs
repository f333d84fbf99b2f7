//! Static reference data: lines, stations and the train roster.
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const DEFAULT_LINES: &str = include_str!("../assets/data/lines.json");
const DEFAULT_STATIONS: &str = include_str!("../assets/data/stations.json");
const DEFAULT_TRAINS: &str = include_str!("../assets/data/trains.json");

static BUNDLED: Lazy<Catalog> = Lazy::new(|| {
    Catalog::from_parts_json(DEFAULT_LINES, DEFAULT_STATIONS, DEFAULT_TRAINS).unwrap_or_else(
        |err| {
            log::error!("bundled catalog rejected: {err}");
            Catalog::empty()
        },
    )
});

/// Errors raised while parsing or validating catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate line id `{0}`")]
    DuplicateLine(String),
    #[error("duplicate station id `{0}`")]
    DuplicateStation(String),
    #[error("duplicate train id `{0}`")]
    DuplicateTrain(String),
    #[error("station `{station}` refers to unknown line `{line}`")]
    UnknownLine { station: String, line: String },
    #[error("station `{station}` has invalid opening date `{date}`")]
    InvalidDate { station: String, date: String },
}

/// A metro line as drawn on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A station entry. Coordinates are percentages of the map canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub line: String,
    pub x: f32,
    pub y: f32,
    /// ISO `YYYY-MM-DD`; ordering of these strings is chronological.
    pub opened_date: String,
    pub line_color: String,
    /// Depth below ground in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architect: Option<String>,
    pub description: String,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_facts: Option<Vec<String>>,
    /// Special-line stations never count toward completion or gate progression.
    #[serde(default)]
    pub is_special_line: bool,
}

impl Station {
    /// The four-digit opening year.
    #[must_use]
    pub fn opening_year(&self) -> &str {
        self.opened_date.get(..4).unwrap_or(&self.opened_date)
    }

    #[must_use]
    pub fn opened_on(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.opened_date, "%Y-%m-%d").ok()
    }
}

/// A rolling-stock model shown in the train gallery and daily missions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetroTrain {
    pub id: String,
    pub name: String,
    pub model: String,
    pub description: String,
    pub year_start: i32,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Read-only reference data the engine is built on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub trains: Vec<MetroTrain>,
}

impl Catalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            stations: Vec::new(),
            trains: Vec::new(),
        }
    }

    /// The catalog embedded in the crate's assets.
    #[must_use]
    pub fn bundled() -> &'static Self {
        &BUNDLED
    }

    /// Load a catalog from a single JSON document with `lines`, `stations`
    /// and `trains` arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the data is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from three separate JSON arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if any array cannot be parsed or the data is inconsistent.
    pub fn from_parts_json(lines: &str, stations: &str, trains: &str) -> Result<Self, CatalogError> {
        Self::from_parts(
            serde_json::from_str(lines)?,
            serde_json::from_str(stations)?,
            serde_json::from_str(trains)?,
        )
    }

    /// Build a catalog from pre-parsed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if ids collide, a station names an unknown line, or a
    /// date does not parse.
    pub fn from_parts(
        lines: Vec<Line>,
        stations: Vec<Station>,
        trains: Vec<MetroTrain>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self {
            lines,
            stations,
            trains,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check id uniqueness, line references and date formats.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut line_ids = HashSet::new();
        for line in &self.lines {
            if !line_ids.insert(line.id.as_str()) {
                return Err(CatalogError::DuplicateLine(line.id.clone()));
            }
        }

        let mut station_ids = HashSet::new();
        for station in &self.stations {
            if !station_ids.insert(station.id.as_str()) {
                return Err(CatalogError::DuplicateStation(station.id.clone()));
            }
            if !line_ids.contains(station.line.as_str()) {
                return Err(CatalogError::UnknownLine {
                    station: station.id.clone(),
                    line: station.line.clone(),
                });
            }
            if station.opened_on().is_none() {
                return Err(CatalogError::InvalidDate {
                    station: station.id.clone(),
                    date: station.opened_date.clone(),
                });
            }
        }

        let mut train_ids = HashSet::new();
        for train in &self.trains {
            if !train_ids.insert(train.id.as_str()) {
                return Err(CatalogError::DuplicateTrain(train.id.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn line(&self, id: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == id)
    }

    #[must_use]
    pub fn train(&self, id: &str) -> Option<&MetroTrain> {
        self.trains.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn contains_station(&self, id: &str) -> bool {
        self.station(id).is_some()
    }

    /// Display name of a station's line, falling back to the raw id.
    #[must_use]
    pub fn line_name<'a>(&'a self, station: &'a Station) -> &'a str {
        self.line(&station.line)
            .map_or(station.line.as_str(), |line| line.name.as_str())
    }

    /// Stations that count toward completion.
    pub fn regular_stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter().filter(|s| !s.is_special_line)
    }

    #[must_use]
    pub fn completion_total(&self) -> usize {
        self.regular_stations().count()
    }

    /// Sorted distinct opening dates. Indices into this list form the
    /// opening-date frontier.
    #[must_use]
    pub fn opening_dates(&self) -> Vec<&str> {
        let mut dates: Vec<&str> = self
            .stations
            .iter()
            .map(|s| s.opened_date.as_str())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    #[must_use]
    pub fn opening_date_index(&self, date: &str) -> Option<usize> {
        self.opening_dates().binary_search(&date).ok()
    }

    /// Index of the latest opening date, `None` for an empty catalog.
    #[must_use]
    pub fn last_date_index(&self) -> Option<usize> {
        self.opening_dates().len().checked_sub(1)
    }

    pub fn stations_opened_on<'a>(&'a self, date: &'a str) -> impl Iterator<Item = &'a Station> {
        self.stations.iter().filter(move |s| s.opened_date == date)
    }

    pub fn stations_on_line<'a>(&'a self, line_id: &'a str) -> impl Iterator<Item = &'a Station> {
        self.stations.iter().filter(move |s| s.line == line_id)
    }
}
