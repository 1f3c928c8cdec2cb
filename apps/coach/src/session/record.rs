//! Durable record sink: one pretty-printed JSON document per session.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::AppError;
use crate::session::SessionState;

const SINK: &str = "session record";

/// Upper bound on `_N` suffixes tried when the second-resolution name is taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

pub struct RecordSink {
    dir: PathBuf,
}

impl RecordSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `session_{YYYYMMDD_HHMMSS}.json` into the session directory.
    ///
    /// The document is the full state with `timestamp` injected when missing;
    /// the file name is derived from that timestamp. Existing documents are
    /// never replaced: a name taken by an earlier save in the same second gets
    /// a `_1`, `_2`, ... suffix. The content is staged in a temp file and
    /// linked into place, so a document is either complete or absent.
    pub fn write(&self, state: &SessionState) -> Result<PathBuf, AppError> {
        let mut doc = state.clone();
        let stamp = *doc.timestamp.get_or_insert_with(Local::now);

        fs::create_dir_all(&self.dir).map_err(|e| AppError::persistence(SINK, e))?;

        let body = to_pretty_json(&doc).map_err(|e| AppError::persistence(SINK, e))?;
        let mut staged =
            NamedTempFile::new_in(&self.dir).map_err(|e| AppError::persistence(SINK, e))?;
        staged
            .write_all(&body)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| AppError::persistence(SINK, e))?;

        let base = format!("session_{}", stamp.format("%Y%m%d_%H%M%S"));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{base}.json")
            } else {
                format!("{base}_{attempt}.json")
            };
            let path = self.dir.join(name);

            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    info!("Session record saved to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    staged = e.file;
                }
                Err(e) => return Err(AppError::persistence(SINK, e.error)),
            }
        }

        Err(AppError::persistence(
            SINK,
            format!("no free file name for {base} after {MAX_NAME_ATTEMPTS} attempts"),
        ))
    }
}

/// Pretty JSON with four-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn state_at(role: &str, stamp: chrono::DateTime<Local>) -> SessionState {
        SessionState {
            role: Some(role.to_string()),
            questions: Some("1) Why?\n2) How?\n3) When?".to_string()),
            timestamp: Some(stamp),
            ..Default::default()
        }
    }

    fn fixed_stamp() -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_creates_directory_and_names_file_from_timestamp() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path().join("sessions"));

        let path = sink.write(&state_at("SRE", fixed_stamp())).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "session_20240309_140507.json"
        );
        assert!(tmp.path().join("sessions").is_dir());
    }

    #[test]
    fn test_document_is_pretty_printed_full_state() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path());
        let state = state_at("SRE", fixed_stamp());

        let path = sink.write(&state).unwrap();
        let raw = fs::read_to_string(&path).unwrap();

        assert!(raw.contains("\n    \"role\": \"SRE\""));
        let recovered: SessionState = serde_json::from_str(&raw).unwrap();
        assert_eq!(recovered, state);
    }

    #[test]
    fn test_injects_timestamp_when_missing() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path());

        let path = sink.write(&SessionState::from_role("SRE")).unwrap();
        let recovered: SessionState =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert!(recovered.timestamp.is_some());
    }

    #[test]
    fn test_saves_a_second_apart_produce_two_documents() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path());

        let first = sink.write(&state_at("SRE", fixed_stamp())).unwrap();
        let second = sink
            .write(&state_at("DBA", fixed_stamp() + Duration::seconds(1)))
            .unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("session_20240309_140508.json"));
    }

    #[test]
    fn test_same_second_save_gets_suffix_instead_of_overwriting() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path());

        let first = sink.write(&state_at("SRE", fixed_stamp())).unwrap();
        let second = sink.write(&state_at("DBA", fixed_stamp())).unwrap();

        assert!(second.ends_with("session_20240309_140507_1.json"));
        let first_doc: SessionState =
            serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
        let second_doc: SessionState =
            serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
        assert_eq!(first_doc.role.as_deref(), Some("SRE"));
        assert_eq!(second_doc.role.as_deref(), Some("DBA"));
    }

    #[test]
    fn test_leaves_no_staging_files_behind() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path());

        sink.write(&state_at("SRE", fixed_stamp())).unwrap();
        sink.write(&state_at("SRE", fixed_stamp())).unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("session_") && n.ends_with(".json")));
    }

    #[test]
    fn test_unwritable_directory_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let sink = RecordSink::new(blocker.join("sessions"));

        let err = sink.write(&SessionState::from_role("SRE")).unwrap_err();
        assert!(matches!(err, AppError::Persistence { sink: "session record", .. }));
    }
}
