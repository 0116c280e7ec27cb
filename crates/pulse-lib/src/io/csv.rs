use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::path::Path;

/// Read one numeric column (matched case-insensitively) from a headed CSV export.
pub fn read_csv_column(path: &Path, column: &str) -> Result<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .with_context(|| format!("missing column '{}' in {}", column, path.display()))?;
    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let raw = record
            .get(idx)
            .ok_or_else(|| anyhow::anyhow!("row {} is missing column '{}'", row + 1, column))?;
        let value: f64 = raw
            .parse()
            .with_context(|| format!("row {}: '{}' is not numeric", row + 1, raw))?;
        values.push(value);
    }
    if values.is_empty() {
        anyhow::bail!("no rows in {}", path.display());
    }
    Ok(values)
}
