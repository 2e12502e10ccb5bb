use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::columns::{GENDER_CODE, TERRITORY_CODE};
use crate::records::{Gender, OfficialRecord};
use crate::table::Table;

/// Number of socio-professional categories shown in the profession chart.
pub const TOP_PROFESSIONS: usize = 15;

/// Counters and chart series derived from a (filtered) table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub distinct_territories: usize,
    /// Share of women among rows with any gender code, in percent.
    pub female_pct: f64,
    pub gender_counts: Vec<(String, usize)>,
    /// Officials per department (or collectivity) name, largest first.
    pub territory_counts: Vec<(String, usize)>,
    pub top_professions: Vec<(String, usize)>,
    /// Officials left out at load time for lack of any territory code.
    pub dropped_without_territory: usize,
}

impl Summary {
    pub fn of(table: &Table) -> Self {
        Self::of_records(&OfficialRecord::from_table(table))
    }

    pub fn of_records(records: &[OfficialRecord]) -> Self {
        let distinct_territories = records
            .iter()
            .filter_map(|r| r.territory_code.as_deref())
            .collect::<BTreeSet<_>>()
            .len();

        let coded: Vec<&OfficialRecord> =
            records.iter().filter(|r| r.gender_code.is_some()).collect();
        let women = coded
            .iter()
            .filter(|r| r.gender == Some(Gender::Female))
            .count();
        let female_pct = if coded.is_empty() {
            0.0
        } else {
            women as f64 * 100.0 / coded.len() as f64
        };

        Summary {
            rows: records.len(),
            distinct_territories,
            female_pct,
            gender_counts: value_counts(
                coded.iter().copied().filter_map(OfficialRecord::gender_label),
            ),
            territory_counts: value_counts(records.iter().filter_map(|r| r.territory_label())),
            top_professions: value_counts(
                records.iter().filter_map(|r| r.sociopro_label.as_deref()),
            )
            .into_iter()
            .take(TOP_PROFESSIONS)
            .collect(),
            dropped_without_territory: 0,
        }
    }

    pub fn with_dropped(mut self, dropped: usize) -> Self {
        self.dropped_without_territory = dropped;
        self
    }
}

/// Occurrences of each value, most frequent first, ties by value.
pub fn value_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, n)| (value.to_string(), n))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Values offered by the territory and gender filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub territories: Vec<String>,
    pub genders: Vec<String>,
}

/// Sorted distinct territory and gender codes of `table`, nulls left out.
/// Meant for the unfiltered dataset so every choice stays visible.
pub fn filter_options(table: &Table) -> FilterOptions {
    let distinct = |column: &str| -> Vec<String> {
        table
            .column_values(column)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    FilterOptions {
        territories: distinct(TERRITORY_CODE),
        genders: distinct(GENDER_CODE),
    }
}

/// A located official for the map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub gender: Option<Gender>,
    pub name: String,
    pub town: Option<String>,
    pub territory: Option<String>,
}

impl MapPoint {
    /// RGB fill: pink for women, blue otherwise.
    pub fn fill_color(&self) -> [u8; 3] {
        match self.gender {
            Some(Gender::Female) => [255, 105, 180],
            _ => [30, 144, 255],
        }
    }
}

/// Officials with both coordinates; rows without them are skipped.
pub fn map_points(table: &Table) -> Vec<MapPoint> {
    OfficialRecord::from_table(table)
        .into_iter()
        .filter_map(|r| {
            let (latitude, longitude) = r.coordinates()?;
            Some(MapPoint {
                latitude,
                longitude,
                gender: r.gender,
                name: r.full_name(),
                territory: r.territory_label().map(str::to_string),
                town: r.town_name,
            })
        })
        .collect()
}

/// Mean position of the points, used to centre the map.
pub fn map_center(points: &[MapPoint]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    Some((lat, lon))
}
