use std::io::Read;

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{ExplorerError, Result};
use crate::normalize::normalize_headers;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// In-memory text table: ordered column names plus rows of nullable cells.
///
/// Every value is kept as text so codes keep their leading zeros. Empty CSV
/// fields are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from already-shaped rows. Every row must have one cell
    /// per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ExplorerError::parse(
                "table",
                format!(
                    "row {} has {} cells, expected {}",
                    idx,
                    row.len(),
                    columns.len()
                ),
            ));
        }
        Ok(Self { columns, rows })
    }

    /// An empty table with no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Same columns, no rows.
    pub fn empty_like(&self) -> Self {
        Self::new(self.columns.clone())
    }

    /// Parse delimited UTF-8 text (optional BOM) whose first record is the
    /// header row. Headers go through the normalizer. `dataset` names the
    /// source in parse errors.
    pub fn from_csv_reader<R: Read>(mut reader: R, delimiter: u8, dataset: &str) -> Result<Self> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| ExplorerError::parse(dataset, e))?;
        Self::from_csv_bytes(&buf, delimiter, dataset)
    }

    pub fn from_csv_bytes(bytes: &[u8], delimiter: u8, dataset: &str) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = rdr
            .headers()
            .map_err(|e| ExplorerError::parse(dataset, format!("reading header row: {}", e)))?
            .clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ExplorerError::parse(dataset, "missing header row"));
        }
        let columns = normalize_headers(headers.iter());

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                ExplorerError::parse(dataset, format!("record {}: {}", idx + 1, e))
            })?;
            rows.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        debug!(dataset, columns = columns.len(), rows = rows.len(), "parsed csv");
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of `name`, or `err` built from the column name.
    pub fn require_column(
        &self,
        name: &str,
        err: impl FnOnce(&str) -> ExplorerError,
    ) -> Result<usize> {
        self.column_index(name).ok_or_else(|| err(name))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Cell of `row` in the named column; `None` for nulls and unknown columns.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        self.column_index(column).and_then(|c| self.cell(row, c))
    }

    /// Cell parsed as a float; unparsable text reads as null.
    pub fn float(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column).and_then(|v| v.trim().parse().ok())
    }

    /// All values of one column, nulls included.
    pub fn column_values(&self, column: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Append a column; `values` must hold one cell per row.
    pub fn push_column(&mut self, name: &str, values: Vec<Option<String>>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(ExplorerError::parse(
                "table",
                format!(
                    "column {} has {} values for {} rows",
                    name,
                    values.len(),
                    self.rows.len()
                ),
            ));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    /// Rewrite every non-null cell of a column in place.
    pub fn map_column(&mut self, column: usize, f: impl Fn(&str) -> String) {
        for row in &mut self.rows {
            if let Some(value) = row[column].as_mut() {
                *value = f(value);
            }
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Option<String>]) -> bool) {
        self.rows.retain(|row| keep(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn parses_semicolon_csv_with_bom_as_text() -> Result<()> {
        let data = "\u{feff}Code du département;Code de la commune;Nom de l'élu\n01;1234;DUPONT\n;09999;\n";
        let table = Table::from_csv_bytes(data.as_bytes(), b';', "officials")?;

        assert_eq!(
            table.columns(),
            ["code_du_departement", "code_de_la_commune", "nom_de_l_elu"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "code_du_departement"), Some("01"));
        assert_eq!(table.get(0, "code_de_la_commune"), Some("1234"));
        assert_eq!(table.get(1, "code_du_departement"), None);
        assert_eq!(table.get(1, "nom_de_l_elu"), None);
        Ok(())
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let data = "a,b\n1,2\n3\n";
        let err = Table::from_csv_bytes(data.as_bytes(), b',', "towns").unwrap_err();
        assert!(matches!(err, ExplorerError::Parse { ref dataset, .. } if dataset == "towns"));
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        let err = Table::from_csv_bytes(b"", b';', "officials").unwrap_err();
        assert!(matches!(err, ExplorerError::Parse { .. }));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = Table::from_csv_bytes(b"a;b\n\xff\xfe;1\n", b';', "officials").unwrap_err();
        assert!(matches!(err, ExplorerError::Parse { .. }));
    }

    #[test]
    fn column_operations() -> Result<()> {
        let mut table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Some("1".into()), None],
                vec![Some("2".into()), Some("x".into())],
            ],
        )?;

        table.push_column("c", vec![Some("2.5".into()), Some("nope".into())])?;
        assert_eq!(table.float(0, "c"), Some(2.5));
        assert_eq!(table.float(1, "c"), None);

        assert!(table.rename_column("b", "bb"));
        assert!(!table.rename_column("missing", "z"));
        assert_eq!(table.get(1, "bb"), Some("x"));

        assert!(table.drop_column("a"));
        assert_eq!(table.columns(), ["bb", "c"]);

        table.retain_rows(|row| row[0].is_some());
        assert_eq!(table.len(), 1);
        assert!(table.push_column("d", vec![]).is_err());
        Ok(())
    }

    #[test]
    fn from_rows_rejects_short_rows() {
        let result = Table::from_rows(vec!["a".into(), "b".into()], vec![vec![None]]);
        assert!(result.is_err());
    }
}
