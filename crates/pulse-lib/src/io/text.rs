use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited floating point values, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not numeric: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric values found");
    }
    Ok(out)
}

/// Read a newline-delimited series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Write one value per line, the inverse of [`read_f64_series`].
pub fn write_f64_series(path: &Path, values: &[f64]) -> Result<()> {
    let mut text = String::with_capacity(values.len() * 8);
    for v in values {
        text.push_str(&v.to_string());
        text.push('\n');
    }
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let parsed = parse_f64_series("# ppg capture\n\n31000\n 31250 \n").unwrap();
        assert_eq!(parsed, vec![31000.0, 31250.0]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_f64_series("1\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_f64_series("# nothing\n").is_err());
    }
}
