use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info};

use crate::errors::AppError;
use crate::session::kv::{generate_session_id, KvSessionStore};
use crate::session::record::RecordSink;
use crate::session::tabular::TabularLog;
use crate::session::SessionState;

/// Outcome of one save. Each sink reports on its own.
#[derive(Debug)]
pub struct SaveReport {
    pub session_id: String,
    pub record: Result<PathBuf, AppError>,
    pub log: Result<(), AppError>,
    pub kv: Result<String, AppError>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.record.is_ok() && self.log.is_ok() && self.kv.is_ok()
    }

    pub fn failures(&self) -> Vec<&AppError> {
        [
            self.record.as_ref().err(),
            self.log.as_ref().err(),
            self.kv.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Persistence boundary: durable record, tabular log and key-value store.
pub struct SessionStore {
    record: RecordSink,
    log: TabularLog,
    kv: KvSessionStore,
}

impl SessionStore {
    pub fn new(record: RecordSink, log: TabularLog, kv: KvSessionStore) -> Self {
        Self { record, log, kv }
    }

    pub fn kv(&self) -> &KvSessionStore {
        &self.kv
    }

    /// Stamps `timestamp` and `session_id`, then writes the state to every sink.
    ///
    /// Sinks run in order (record, log, key-value) and every one is attempted
    /// regardless of earlier failures. The state is consumed.
    pub async fn save(&self, mut state: SessionState) -> SaveReport {
        state.timestamp = Some(Local::now());
        let session_id = generate_session_id();
        state.session_id = Some(session_id.clone());

        let record = logged("session record", &session_id, self.record.write(&state));
        let log = logged("tabular log", &session_id, self.log.append(&state));
        let kv = logged(
            "key-value store",
            &session_id,
            self.kv.save_session(&state).await,
        );

        let report = SaveReport {
            session_id,
            record,
            log,
            kv,
        };
        if report.is_complete() {
            info!("Session {} saved to all sinks", report.session_id);
        }
        report
    }
}

fn logged<T>(sink: &str, session_id: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(e) = &result {
        error!(sink, session_id, error = %e, "Failed to save session");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::session::kv::tests::{DownBackend, MemoryBackend};
    use crate::session::kv::KvBackend;

    fn store_in(dir: &std::path::Path, backend: Arc<dyn KvBackend>) -> SessionStore {
        SessionStore::new(
            RecordSink::new(dir.join("sessions")),
            TabularLog::new(dir.join("sessions/interview_sessions.csv")),
            KvSessionStore::new(backend),
        )
    }

    fn partial_state() -> SessionState {
        SessionState {
            resume_text: Some("resume".to_string()),
            role: Some("Platform Engineer".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_writes_all_three_sinks_with_same_id() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path(), Arc::new(MemoryBackend::default()));

        let report = store.save(partial_state()).await;

        assert!(report.is_complete(), "failures: {:?}", report.failures());
        let record_path = report.record.as_ref().unwrap();
        let doc: SessionState =
            serde_json::from_str(&fs::read_to_string(record_path).unwrap()).unwrap();
        assert_eq!(doc.session_id.as_deref(), Some(report.session_id.as_str()));
        assert!(doc.timestamp.is_some());

        assert_eq!(report.kv.as_ref().unwrap(), &report.session_id);
        let loaded = store.kv().load_session(&report.session_id).await.unwrap();
        assert_eq!(loaded, doc);

        let csv = fs::read_to_string(tmp.path().join("sessions/interview_sessions.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_key_value_outage_does_not_block_file_sinks() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path(), Arc::new(DownBackend));

        let report = store.save(partial_state()).await;

        assert!(report.record.is_ok());
        assert!(report.log.is_ok());
        assert!(report.kv.is_err());
        assert!(!report.is_complete());
        assert_eq!(report.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_failure_does_not_block_later_sinks() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the sessions directory should be breaks both file sinks.
        fs::write(tmp.path().join("sessions"), "in the way").unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let store = store_in(tmp.path(), backend.clone());

        let report = store.save(partial_state()).await;

        assert!(report.record.is_err());
        assert!(report.log.is_err());
        assert!(report.kv.is_ok());
        assert_eq!(backend.entries.lock().await.len(), 1);
    }
}
