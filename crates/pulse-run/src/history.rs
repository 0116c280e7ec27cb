use crate::record::MetricsRecord;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence boundary: one call per completed analysis.
pub trait RecordStore {
    fn save(&mut self, record: &MetricsRecord) -> Result<()>;
}

/// One JSON file per record, named after its timestamp.
#[derive(Debug, Clone)]
pub struct JsonHistory {
    dir: PathBuf,
}

impl JsonHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, record: &MetricsRecord) -> PathBuf {
        self.dir.join(format!("{}.json", record.timestamp))
    }

    /// All readable records, newest first. Unparseable files are skipped.
    pub fn load_all(&self) -> Result<Vec<MetricsRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("listing history {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(err) => log::warn!("skipping {}: {err:#}", path.display()),
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

impl RecordStore for JsonHistory {
    fn save(&mut self, record: &MetricsRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating history dir {}", self.dir.display()))?;
        let path = self.path_for(record);
        let file =
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(file, record)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("record saved to {}", path.display());
        Ok(())
    }
}

pub fn read_record(path: &Path) -> Result<MetricsRecord> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let record = serde_json::from_reader(file)
        .with_context(|| format!("parsing record {}", path.display()))?;
    Ok(record)
}
