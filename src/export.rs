use std::{
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use tempfile::NamedTempFile;
use tracing::info;

use crate::columns::{LATITUDE, LONGITUDE};
use crate::table::Table;

/// Write `table` as comma-delimited UTF-8 CSV: a header with every column,
/// then one line per row. Nulls are written as empty fields.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_writer(writer);
    wtr.write_record(table.columns())
        .context("writing CSV header")?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .context("writing CSV row")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

/// CSV export as an in-memory string, for download buttons and stdout.
pub fn to_csv_string(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).context("CSV export is not UTF-8")
}

/// Temporary file next to `path`; removed on drop unless persisted.
fn temp_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming to {}", path.display()))?;
    Ok(())
}

/// Write the CSV export to `path`, replacing it atomically.
pub fn write_csv_file(table: &Table, path: &Path) -> Result<()> {
    let tmp = temp_beside(path)?;
    write_csv(table, BufWriter::new(tmp.as_file()))?;
    persist(tmp, path)?;
    info!(rows = table.len(), path = %path.display(), "csv export written");
    Ok(())
}

fn is_coordinate(column: &str) -> bool {
    column == LATITUDE || column == LONGITUDE
}

/// Arrow schema of the export: every column is nullable text except the
/// coordinates, which are nullable Float64.
pub fn arrow_schema(table: &Table) -> Schema {
    Schema::new(
        table
            .columns()
            .iter()
            .map(|name| {
                let ty = if is_coordinate(name) {
                    DataType::Float64
                } else {
                    DataType::Utf8
                };
                Field::new(name, ty, true)
            })
            .collect::<Vec<_>>(),
    )
}

pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let schema = Arc::new(arrow_schema(table));
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if is_coordinate(name) {
                let values: Float64Array = table
                    .rows()
                    .iter()
                    .map(|row| row[idx].as_deref().and_then(|v| v.trim().parse::<f64>().ok()))
                    .collect();
                Arc::new(values) as ArrayRef
            } else {
                let values: StringArray = table
                    .rows()
                    .iter()
                    .map(|row| row[idx].as_deref())
                    .collect();
                Arc::new(values) as ArrayRef
            }
        })
        .collect();
    RecordBatch::try_new(schema, arrays).context("building export record batch")
}

/// Write `table` to a Snappy-compressed Parquet file at `path`.
pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let batch = to_record_batch(table)?;
    let tmp = temp_beside(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(tmp.as_file()), batch.schema(), Some(props))
        .context("creating Arrow writer for export")?;
    writer.write(&batch).context("writing export batch")?;
    writer.close().context("closing export writer")?;
    persist(tmp, path)?;
    info!(rows = table.len(), path = %path.display(), "parquet export written");
    Ok(())
}
