use std::{collections::HashMap, fs, path::Path, time::Instant};

use tracing::{debug, error, info, instrument};

use crate::columns::{INSEE_TOWN_CODE, LATITUDE, LONGITUDE, TOWN_CODE, TOWN_CODE_WIDTH};
use crate::config::DataSource;
use crate::error::{ExplorerError, Outcome, Result};
use crate::fetch::DownloadCache;
use crate::table::Table;

pub const TOWNS_DATASET: &str = "towns";
pub const TOWNS_DELIMITER: u8 = b',';

/// Left-pad an INSEE code with zeros to 5 characters. Codes read through a
/// numeric type lose the leading zero of departments 01-09.
pub fn pad_town_code(code: &str) -> String {
    format!("{:0>width$}", code, width = TOWN_CODE_WIDTH)
}

/// Parse a cached towns CSV and rename its INSEE column to the canonical
/// town code column.
pub fn read_towns(path: &Path) -> Result<Table> {
    let bytes = fs::read(path).map_err(|e| {
        ExplorerError::parse(TOWNS_DATASET, format!("reading {}: {}", path.display(), e))
    })?;
    let mut towns = Table::from_csv_bytes(&bytes, TOWNS_DELIMITER, TOWNS_DATASET)?;
    if towns.has_column(INSEE_TOWN_CODE) {
        towns.drop_column(TOWN_CODE);
        towns.rename_column(INSEE_TOWN_CODE, TOWN_CODE);
    }
    Ok(towns)
}

/// Left-join town latitude/longitude onto `officials` by zero-padded town
/// code.
///
/// Every officials row is kept exactly once: unmatched rows get null
/// coordinates and, when a code appears several times in `towns`, the first
/// town row wins. Coordinates that are not valid floats become null. The
/// inputs are left untouched.
pub fn join_coordinates(officials: &Table, towns: &Table) -> Result<Table> {
    let missing = |side: &'static str| {
        move |column: &str| ExplorerError::join(format!("{} table has no `{}` column", side, column))
    };
    let town_code = towns.require_column(TOWN_CODE, missing("towns"))?;
    let town_lat = towns.require_column(LATITUDE, missing("towns"))?;
    let town_lon = towns.require_column(LONGITUDE, missing("towns"))?;
    officials.require_column(TOWN_CODE, missing("officials"))?;

    let mut coordinates: HashMap<String, (Option<String>, Option<String>)> =
        HashMap::with_capacity(towns.len());
    let mut duplicates = 0usize;
    for row in towns.rows() {
        let Some(code) = row[town_code].as_deref() else {
            continue;
        };
        let as_float = |cell: &Option<String>| {
            cell.as_deref()
                .map(str::trim)
                .filter(|v| v.parse::<f64>().is_ok())
                .map(str::to_string)
        };
        match coordinates.entry(pad_town_code(code)) {
            std::collections::hash_map::Entry::Occupied(_) => duplicates += 1,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((as_float(&row[town_lat]), as_float(&row[town_lon])));
            }
        }
    }
    if duplicates > 0 {
        debug!(duplicates, "duplicate town codes ignored, first row kept");
    }

    let mut merged = officials.clone();
    merged.drop_column(LATITUDE);
    merged.drop_column(LONGITUDE);
    let code_idx = merged.require_column(TOWN_CODE, missing("officials"))?;
    merged.map_column(code_idx, pad_town_code);

    let mut lats = Vec::with_capacity(merged.len());
    let mut lons = Vec::with_capacity(merged.len());
    let mut matched = 0usize;
    for row in merged.rows() {
        match row[code_idx].as_deref().and_then(|c| coordinates.get(c)) {
            Some((lat, lon)) => {
                matched += 1;
                lats.push(lat.clone());
                lons.push(lon.clone());
            }
            None => {
                lats.push(None);
                lons.push(None);
            }
        }
    }
    merged.push_column(LATITUDE, lats)?;
    merged.push_column(LONGITUDE, lons)?;

    info!(
        rows = merged.len(),
        matched,
        unmatched = merged.len() - matched,
        "town coordinates joined"
    );
    Ok(merged)
}

/// Fetch (once) the towns dataset and join its coordinates onto `officials`.
#[instrument(level = "info", skip(officials, cache, source), fields(url = %source.url, rows = officials.len()))]
pub fn try_enrich(officials: &Table, cache: &DownloadCache, source: &DataSource) -> Result<Table> {
    let start = Instant::now();
    let path = cache.fetch(&source.url, &source.file)?;
    let towns = read_towns(&path)?;
    let merged = join_coordinates(officials, &towns)?;
    debug!(elapsed = ?start.elapsed(), "enrich done");
    Ok(merged)
}

/// Like [`try_enrich`], but a failure yields the unenriched officials table
/// and the error.
pub fn enrich(officials: &Table, cache: &DownloadCache, source: &DataSource) -> Outcome<Table> {
    let result = try_enrich(officials, cache, source);
    if let Err(e) = &result {
        error!(error = %e, "merging town coordinates failed");
    }
    Outcome::recover(result, || officials.clone())
}
