use std::{fs::OpenOptions, io::Write, path::Path, sync::Mutex};

use tracing::warn;

use crate::trace::trace::TraceRecord;

/// Append-only replay log. Records are kept in memory and, when a path is
/// given, appended to it as JSON lines.
pub struct TraceLogger {
    file: Option<Mutex<std::fs::File>>,
    records: Mutex<Vec<TraceRecord>>,
}

impl TraceLogger {
    pub fn new(path: &Path) -> Self {
        let file = OpenOptions::new().create(true).append(true).open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
                records: Mutex::new(Vec::new()),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file");
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            file: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self, record: TraceRecord) {
        if let Some(file_mutex) = &self.file {
            self.append(file_mutex, &record);
        }

        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(e) => warn!(error = %e, "trace record buffer lock poisoned"),
        }
    }

    fn append(&self, file_mutex: &Mutex<std::fs::File>, record: &TraceRecord) {
        let json = match serde_json::to_string(record) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize trace record");
                return;
            }
        };

        let mut file = match file_mutex.lock() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "trace logger lock poisoned");
                return;
            }
        };

        if let Err(e) = writeln!(file, "{}", json) {
            warn!(error = %e, "failed to write trace record");
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn into_records(self) -> Vec<TraceRecord> {
        self.records.into_inner().unwrap_or_default()
    }
}
