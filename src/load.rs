use std::{fs, path::Path, time::Instant};

use tracing::{error, info, instrument, warn};

use crate::columns::{COLLECTIVITY_CODE, DEPARTMENT_CODE, TERRITORY_CODE};
use crate::config::DataSource;
use crate::error::{ExplorerError, Outcome, Result};
use crate::fetch::DownloadCache;
use crate::table::Table;

pub const OFFICIALS_DATASET: &str = "officials";
pub const OFFICIALS_DELIMITER: u8 = b';';

/// Officials table together with the number of rows the territory code
/// derivation had to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Officials {
    pub table: Table,
    pub dropped: usize,
}

/// Parse a cached officials CSV and derive the territory code.
pub fn read_officials(path: &Path) -> Result<Officials> {
    let bytes = fs::read(path).map_err(|e| {
        ExplorerError::parse(OFFICIALS_DATASET, format!("reading {}: {}", path.display(), e))
    })?;
    let mut table = Table::from_csv_bytes(&bytes, OFFICIALS_DELIMITER, OFFICIALS_DATASET)?;
    let dropped = derive_territory_code(&mut table)?;
    Ok(Officials { table, dropped })
}

/// Append `code_territoire`: the department code, or the collectivity code
/// when the department code is null. The department code wins when both are
/// set. Rows with neither are dropped so the column is never null; the number
/// of dropped rows is returned.
pub fn derive_territory_code(table: &mut Table) -> Result<usize> {
    let missing = |column: &str| {
        ExplorerError::parse(
            OFFICIALS_DATASET,
            format!("missing required column `{}`", column),
        )
    };
    let department = table.require_column(DEPARTMENT_CODE, missing)?;
    let collectivity = table.column_index(COLLECTIVITY_CODE);
    if collectivity.is_none() {
        warn!(
            column = COLLECTIVITY_CODE,
            "optional column absent, territory code uses department code only"
        );
    }

    let before = table.len();
    table.retain_rows(|row| {
        row[department].is_some() || collectivity.map_or(false, |c| row[c].is_some())
    });
    let dropped = before - table.len();
    if dropped > 0 {
        warn!(dropped, "rows without department or collectivity code dropped");
    }

    let codes = table
        .rows()
        .iter()
        .map(|row| {
            row[department]
                .clone()
                .or_else(|| collectivity.and_then(|c| row[c].clone()))
        })
        .collect();
    table.drop_column(TERRITORY_CODE);
    table.push_column(TERRITORY_CODE, codes)?;
    Ok(dropped)
}

/// Fetch (once) and parse the officials dataset.
#[instrument(level = "info", skip(cache, source), fields(url = %source.url))]
pub fn try_load_officials(cache: &DownloadCache, source: &DataSource) -> Result<Officials> {
    let start = Instant::now();
    let path = cache.fetch(&source.url, &source.file)?;
    let officials = read_officials(&path)?;
    info!(
        rows = officials.table.len(),
        dropped = officials.dropped,
        columns = officials.table.columns().len(),
        elapsed = ?start.elapsed(),
        "officials loaded"
    );
    Ok(officials)
}

/// Like [`try_load_officials`], but a failure yields an empty table and the
/// error instead of aborting the session.
pub fn load_officials(cache: &DownloadCache, source: &DataSource) -> Outcome<Officials> {
    let result = try_load_officials(cache, source);
    if let Err(e) = &result {
        error!(error = %e, "loading officials failed");
    }
    Outcome::recover(result, Officials::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{GENDER_CODE, TOWN_CODE};
    use crate::fetch::testing::FakeTransport;
    use anyhow::Result;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const URL: &str = "http://example.test/elus.csv";

    const OFFICIALS_CSV: &str = "\u{feff}Code du département;Libellé du département;Code de la collectivité à statut particulier;Libellé de la collectivité à statut particulier;Code de la commune;Libellé de la commune;Nom de l'élu;Prénom de l'élu;Code sexe\n\
75;Paris;;;75056;Paris;HIDALGO;Anne;F\n\
;;975;Saint-Pierre-et-Miquelon;97502;Saint-Pierre;CLAIREAUX;Karine;F\n\
01;Ain;;;1004;Ambérieu-en-Bugey;DUPONT;Jean;M\n";

    fn source() -> DataSource {
        DataSource {
            url: URL.to_string(),
            file: PathBuf::from("elus.csv"),
        }
    }

    #[test]
    fn loads_and_derives_territory_code() -> Result<()> {
        let tmp = tempdir()?;
        let cache = DownloadCache::new(tmp.path(), FakeTransport::default().with(URL, OFFICIALS_CSV));

        let Officials { table, dropped } = try_load_officials(&cache, &source())?;
        assert_eq!(dropped, 0);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0, TERRITORY_CODE), Some("75"));
        assert_eq!(table.get(1, TERRITORY_CODE), Some("975"));
        assert_eq!(table.get(2, TERRITORY_CODE), Some("01"));
        // text only: leading zeros survive, short town codes are left for the merger
        assert_eq!(table.get(2, TOWN_CODE), Some("1004"));
        assert_eq!(table.get(0, GENDER_CODE), Some("F"));
        assert_eq!(table.columns().last().map(String::as_str), Some(TERRITORY_CODE));
        Ok(())
    }

    #[test]
    fn reports_rows_without_any_territory_code() -> Result<()> {
        let tmp = tempdir()?;
        let csv = "Code du département;Code de la collectivité à statut particulier;Nom de l'élu\n\
13;;PAYAN\n\
;;INCONNU\n";
        let cache = DownloadCache::new(tmp.path(), FakeTransport::default().with(URL, csv));

        let officials = try_load_officials(&cache, &source())?;
        assert_eq!(officials.table.len(), 1);
        assert_eq!(officials.dropped, 1);
        assert_eq!(officials.table.get(0, TERRITORY_CODE), Some("13"));
        Ok(())
    }

    #[test]
    fn department_code_wins_when_both_are_present() -> Result<()> {
        let mut table = Table::from_rows(
            vec![DEPARTMENT_CODE.into(), COLLECTIVITY_CODE.into()],
            vec![
                vec![Some("75".into()), None],
                vec![None, Some("975".into())],
                vec![Some("2A".into()), Some("20R".into())],
                vec![None, None],
            ],
        )?;
        assert_eq!(derive_territory_code(&mut table)?, 1);

        let codes = table.column_values(TERRITORY_CODE).unwrap();
        assert_eq!(codes, vec![Some("75"), Some("975"), Some("2A")]);
        Ok(())
    }

    #[test]
    fn collectivity_column_is_optional() -> Result<()> {
        let mut table = Table::from_rows(
            vec![DEPARTMENT_CODE.into()],
            vec![vec![Some("13".into())], vec![None]],
        )?;
        assert_eq!(derive_territory_code(&mut table)?, 1);
        assert_eq!(table.column_values(TERRITORY_CODE).unwrap(), vec![Some("13")]);
        Ok(())
    }

    #[test]
    fn missing_department_column_is_a_parse_error() {
        let mut table = Table::new(vec![COLLECTIVITY_CODE.into()]);
        let err = derive_territory_code(&mut table).unwrap_err();
        assert!(matches!(err, ExplorerError::Parse { .. }));
        assert!(err.to_string().contains(DEPARTMENT_CODE));
    }

    #[test]
    fn failures_degrade_to_an_empty_table() -> Result<()> {
        let tmp = tempdir()?;

        // transport failure
        let cache = DownloadCache::new(tmp.path().join("a"), FakeTransport::default());
        let outcome = load_officials(&cache, &source());
        assert!(outcome.value().table.is_empty());
        assert!(matches!(outcome.error(), Some(ExplorerError::Transport { .. })));

        // malformed file
        let cache = DownloadCache::new(
            tmp.path().join("b"),
            FakeTransport::default().with(URL, "Code du département;Code sexe\n75\n"),
        );
        let outcome = load_officials(&cache, &source());
        assert!(outcome.value().table.is_empty());
        assert!(matches!(outcome.error(), Some(ExplorerError::Parse { .. })));
        Ok(())
    }
}
