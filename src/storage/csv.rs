use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use tracing::info;

use crate::harvest::models::MergedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    Completed,
    Interrupted,
}

impl SaveReason {
    pub fn label(self) -> &'static str {
        match self {
            SaveReason::Completed => "completed",
            SaveReason::Interrupted => "interrupted",
        }
    }
}

/// CSV sink. The header is the column set observed on the first record;
/// later records fill header columns only — a missing field serializes as
/// the empty string, a field outside the header is dropped.
pub struct CsvSink {
    pattern: String,
}

impl CsvSink {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Writes all records to the patterned path. Returns `Ok(None)` without
    /// touching the filesystem when there is nothing to save.
    pub fn save(
        &self,
        records: &[MergedRecord],
        reason: SaveReason,
    ) -> anyhow::Result<Option<PathBuf>> {
        let Some(first) = records.first() else {
            info!(reason = reason.label(), "no records to save");
            return Ok(None);
        };

        let path = PathBuf::from(self.render_path());
        let header = first.columns();

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating output file {}", path.display()))?;
        writer.write_record(&header)?;

        for record in records {
            let fields: HashMap<&str, String> = record.fields().into_iter().collect();
            let row: Vec<&str> = header
                .iter()
                .map(|column| fields.get(column).map(String::as_str).unwrap_or(""))
                .collect();
            writer.write_record(&row)?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = records.len(),
            reason = reason.label(),
            "harvest saved"
        );
        Ok(Some(path))
    }

    fn render_path(&self) -> String {
        self.pattern
            .replace("{date}", &Local::now().format("%Y%m%d").to_string())
    }
}
