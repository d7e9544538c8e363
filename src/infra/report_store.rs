use crate::app::ports::ReportStorePort;
use crate::domain::ReportRecord;
use std::fs;
use std::path::PathBuf;

/// Writes `<id>.html` and `<id>.json` side by side.
pub struct FsReportStore {
    output_dir: PathBuf,
}

impl FsReportStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportStorePort for FsReportStore {
    fn save(&self, record: &ReportRecord, html: &str) -> Result<PathBuf, String> {
        fs::create_dir_all(&self.output_dir).map_err(|e| e.to_string())?;

        let html_path = self.output_dir.join(&record.artifact_name);
        fs::write(&html_path, html).map_err(|e| format!("{}: {}", html_path.display(), e))?;

        let json_path = self.output_dir.join(format!("{}.json", record.id));
        let metadata = serde_json::to_string_pretty(record).map_err(|e| e.to_string())?;
        fs::write(&json_path, metadata).map_err(|e| format!("{}: {}", json_path.display(), e))?;

        tracing::info!("Report saved: {}", json_path.display());
        Ok(json_path)
    }
}
