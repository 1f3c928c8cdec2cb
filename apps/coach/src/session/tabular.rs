//! Append-only CSV log with one row per saved session.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use fs2::FileExt;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::session::SessionState;

const SINK: &str = "tabular log";

/// Column order of the log. Changing it breaks existing files.
pub const HEADER: [&str; 4] = ["timestamp", "role", "questions", "follow_up"];

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    timestamp: String,
    role: &'a str,
    questions: String,
    follow_up: String,
}

impl<'a> LogRow<'a> {
    fn from_state(state: &'a SessionState) -> Self {
        LogRow {
            timestamp: state
                .timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            role: state.role.as_deref().unwrap_or_default(),
            questions: flatten(state.questions.as_deref().unwrap_or_default()),
            follow_up: flatten(state.follow_up.as_deref().unwrap_or_default()),
        }
    }
}

/// Replaces line breaks with spaces so a field stays on one line.
fn flatten(text: &str) -> String {
    text.replace(&['\r', '\n'][..], " ")
}

pub struct TabularLog {
    path: PathBuf,
}

impl TabularLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Appends one row for `state`, writing the header first when the file is new.
    ///
    /// The header check and the append happen under an exclusive file lock, so
    /// two processes creating the log at the same time write one header.
    pub fn append(&self, state: &SessionState) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AppError::persistence(SINK, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::persistence(SINK, e))?;
        file.lock_exclusive()
            .map_err(|e| AppError::persistence(SINK, e))?;

        // Lock is released when `file` is dropped.
        let wrote_header = append_locked(&file, state)?;

        info!(
            "Tabular log updated: {} (header written: {wrote_header})",
            self.path.display()
        );
        Ok(())
    }
}

fn append_locked(mut file: &File, state: &SessionState) -> Result<bool, AppError> {
    let needs_header = file
        .metadata()
        .map_err(|e| AppError::persistence(SINK, e))?
        .len()
        == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if needs_header {
        writer
            .write_record(HEADER)
            .map_err(|e| AppError::persistence(SINK, e))?;
    }
    writer
        .serialize(LogRow::from_state(state))
        .map_err(|e| AppError::persistence(SINK, e))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::persistence(SINK, e))?;

    // Header and row go out in a single write.
    file.write_all(&bytes)
        .and_then(|_| file.flush())
        .map_err(|e| AppError::persistence(SINK, e))?;
    Ok(needs_header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::Local;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader.records().map(|r| r.unwrap()).collect()
    }

    fn sample_state() -> SessionState {
        SessionState {
            role: Some("QA Automation Engineer".to_string()),
            questions: Some(
                "1) What is a flaky test?\n2) Page objects?\r\n3) CI gates?".to_string(),
            ),
            follow_up: Some("How would you\nquarantine flaky tests?".to_string()),
            timestamp: Some(Local::now()),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_append_writes_header_then_row() {
        let tmp = TempDir::new().unwrap();
        let log = TabularLog::new(tmp.path().join("sessions/interview_sessions.csv"));

        log.append(&sample_state()).unwrap();

        let records = read_records(log.path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].iter().collect::<Vec<_>>(), HEADER.to_vec());
        assert_eq!(&records[1][1], "QA Automation Engineer");
    }

    #[test]
    fn test_second_append_adds_row_without_header() {
        let tmp = TempDir::new().unwrap();
        let log = TabularLog::new(tmp.path().join("interview_sessions.csv"));

        log.append(&sample_state()).unwrap();
        log.append(&SessionState::from_role("Data Engineer")).unwrap();

        let records = read_records(log.path());
        assert_eq!(records.len(), 3);
        let headers = records.iter().filter(|r| &r[0] == "timestamp").count();
        assert_eq!(headers, 1);
        assert_eq!(&records[2][1], "Data Engineer");
    }

    #[test]
    fn test_newlines_are_flattened_to_single_line_fields() {
        let tmp = TempDir::new().unwrap();
        let log = TabularLog::new(tmp.path().join("interview_sessions.csv"));

        log.append(&sample_state()).unwrap();

        let raw = fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2, "one header line and one data line");

        let records = read_records(log.path());
        assert!(!records[1][2].contains('\n'));
        assert!(!records[1][2].contains('\r'));
        assert!(records[1][2].starts_with("1) What is a flaky test? 2) Page objects?"));
        assert_eq!(&records[1][3], "How would you quarantine flaky tests?");
    }

    #[test]
    fn test_missing_fields_become_empty_columns() {
        let tmp = TempDir::new().unwrap();
        let log = TabularLog::new(tmp.path().join("interview_sessions.csv"));

        log.append(&SessionState::from_role("SRE")).unwrap();

        let records = read_records(log.path());
        assert_eq!(records[1].len(), 4);
        assert_eq!(&records[1][0], "");
        assert_eq!(&records[1][3], "");
    }

    #[test]
    fn test_existing_log_from_previous_run_is_appended() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("interview_sessions.csv");

        TabularLog::new(&path).append(&sample_state()).unwrap();
        // A fresh handle stands in for a process restart.
        TabularLog::new(&path).append(&sample_state()).unwrap();

        assert_eq!(read_records(&path).len(), 3);
    }

    #[test]
    fn test_flatten_replaces_every_line_break() {
        assert_eq!(flatten("a\nb\r\nc"), "a b  c");
        assert_eq!(flatten("single"), "single");
    }

    #[test]
    fn test_concurrent_first_writers_share_one_header() {
        let tmp = TempDir::new().unwrap();
        let log = Arc::new(TabularLog::new(tmp.path().join("sessions/interview_sessions.csv")));
        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));

        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let log = log.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    log.append(&SessionState::from_role(format!("Role {i}"))).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.starts_with("timestamp,role,questions,follow_up"));
        assert_eq!(raw.lines().filter(|l| l.starts_with("timestamp,")).count(), 1);
        assert_eq!(raw.lines().count(), writers + 1);
    }
}
