//! Resume text extraction.

use std::path::Path;

use anyhow::Context;
use tracing::{error, info};

use crate::errors::AppError;

/// Turns a resume file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, AppError>;
}

/// Reads `.txt`/`.md` resumes as-is and everything else as PDF.
pub struct ResumeExtractor;

impl TextExtractor for ResumeExtractor {
    fn extract(&self, path: &Path) -> Result<String, AppError> {
        if !path.is_file() {
            error!("Resume file not found: {}", path.display());
            return Err(AppError::NotFound(format!(
                "Resume file {} does not exist",
                path.display()
            )));
        }

        let raw = if is_plain_text(path) {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read resume {}", path.display()))?
        } else {
            pdf_extract::extract_text(path).map_err(|e| {
                error!("Failed to extract text from PDF {}: {e}", path.display());
                anyhow::anyhow!("Failed to extract text from PDF {}: {e}", path.display())
            })?
        };

        let text = normalize(&raw);
        if text.is_empty() {
            error!("No text extracted from resume {}", path.display());
            return Err(AppError::EmptyContent(format!(
                "No text extracted from resume {}",
                path.display()
            )));
        }

        info!(
            "Extracted {} characters of resume text from {}",
            text.chars().count(),
            path.display()
        );
        Ok(text)
    }
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
}

/// Drops form feeds between PDF pages and trims the result.
fn normalize(raw: &str) -> String {
    raw.replace('\u{c}', "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_path_is_not_found() {
        let err = ResumeExtractor
            .extract(Path::new("/definitely/not/here/resume.pdf"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_directory_is_not_a_resume() {
        let tmp = TempDir::new().unwrap();
        let err = ResumeExtractor.extract(tmp.path()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_plain_text_resume_is_trimmed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("resume.txt");
        fs::write(&path, "\n\n  Jane Doe\nSenior QA Automation Engineer  \n").unwrap();

        let text = ResumeExtractor.extract(&path).unwrap();
        assert_eq!(text, "Jane Doe\nSenior QA Automation Engineer");
    }

    #[test]
    fn test_blank_resume_is_empty_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("resume.md");
        fs::write(&path, "   \n\t\n").unwrap();

        let err = ResumeExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, AppError::EmptyContent(_)));
    }

    #[test]
    fn test_unreadable_pdf_is_internal_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("resume.pdf");
        fs::write(&path, "this is not a pdf").unwrap();

        let err = ResumeExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_normalize_replaces_page_breaks() {
        assert_eq!(normalize("page one\u{c}page two\n"), "page one\npage two");
    }
}
