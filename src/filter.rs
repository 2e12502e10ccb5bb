use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::columns::{GENDER_CODE, LAST_NAME, TERRITORY_CODE, TOWN_NAME};
use crate::error::{ExplorerError, Outcome, Result};
use crate::table::Table;

/// User-selected filters for one interaction. Every criterion is optional;
/// empty sets and empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub territories: BTreeSet<String>,
    pub genders: BTreeSet<String>,
    pub town_contains: Option<String>,
    pub name_contains: Option<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn territories<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.territories.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn genders<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genders.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn town_contains(mut self, needle: impl Into<String>) -> Self {
        self.town_contains = Some(needle.into());
        self
    }

    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
            && self.genders.is_empty()
            && needle(&self.town_contains).is_none()
            && needle(&self.name_contains).is_none()
    }
}

fn needle(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

enum Predicate {
    OneOf(usize, BTreeSet<String>),
    Contains(usize, String),
}

impl Predicate {
    fn matches(&self, row: &[Option<String>]) -> bool {
        match self {
            Predicate::OneOf(col, set) => row[*col].as_ref().map_or(false, |v| set.contains(v)),
            Predicate::Contains(col, needle) => row[*col]
                .as_deref()
                .map_or(false, |v| v.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Keep the rows matching every active criterion: territory code in the set,
/// gender code in the set, town name containing the town needle and last name
/// containing the name needle (both case-insensitive, literal). Null cells
/// never match an active criterion. Only columns of active criteria are
/// required.
pub fn try_apply(table: &Table, criteria: &FilterCriteria) -> Result<Table> {
    let column = |name: &str| {
        table.require_column(name, |c| {
            ExplorerError::filter(format!("table has no `{}` column", c))
        })
    };

    let mut predicates = Vec::new();
    if !criteria.territories.is_empty() {
        predicates.push(Predicate::OneOf(
            column(TERRITORY_CODE)?,
            criteria.territories.clone(),
        ));
    }
    if !criteria.genders.is_empty() {
        predicates.push(Predicate::OneOf(
            column(GENDER_CODE)?,
            criteria.genders.clone(),
        ));
    }
    if let Some(town) = needle(&criteria.town_contains) {
        predicates.push(Predicate::Contains(column(TOWN_NAME)?, town));
    }
    if let Some(name) = needle(&criteria.name_contains) {
        predicates.push(Predicate::Contains(column(LAST_NAME)?, name));
    }

    let mut filtered = table.clone();
    filtered.retain_rows(|row| predicates.iter().all(|p| p.matches(row)));
    debug!(
        before = table.len(),
        after = filtered.len(),
        predicates = predicates.len(),
        "filters applied"
    );
    Ok(filtered)
}

/// Like [`try_apply`], but a failure yields an empty table (same columns)
/// rather than a partial result.
pub fn apply(table: &Table, criteria: &FilterCriteria) -> Outcome<Table> {
    let result = try_apply(table, criteria);
    if let Err(e) = &result {
        error!(error = %e, "filter failed, showing nothing");
    }
    Outcome::recover(result, || table.empty_like())
}
