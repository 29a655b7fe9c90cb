use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MEDIA_TYPE: &str = "application/vnd.ms-excel";

#[derive(Debug, thiserror::Error)]
pub enum FileSelectError {
    #[error("'{0}' is not a spreadsheet; choose an .xlsx or .xls file")]
    UnsupportedType(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The spreadsheet chosen for analysis.
///
/// Contents are never inspected here. Re-selecting a file creates a new
/// value rather than mutating this one.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    name: String,
    media_type: &'static str,
    contents: Arc<[u8]>,
}

impl SelectedFile {
    /// Build a selection from an in-memory payload, checking the extension of
    /// `name`.
    pub fn new(name: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Result<Self, FileSelectError> {
        let name = name.into();
        let media_type = media_type_for(&name)
            .ok_or_else(|| FileSelectError::UnsupportedType(name.clone()))?;

        Ok(Self {
            name,
            media_type,
            contents: contents.into(),
        })
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FileSelectError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        // Reject by extension before touching the disk
        if media_type_for(&name).is_none() {
            return Err(FileSelectError::UnsupportedType(name));
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| FileSelectError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Read {} ({} bytes)", name, bytes.len());

        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

fn media_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "xlsx" => Some(XLSX_MEDIA_TYPE),
        "xls" => Some(XLS_MEDIA_TYPE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_by_extension() {
        assert_eq!(media_type_for("readings.xlsx"), Some(XLSX_MEDIA_TYPE));
        assert_eq!(media_type_for("READINGS.XLS"), Some(XLS_MEDIA_TYPE));
        assert_eq!(media_type_for("readings.csv"), None);
        assert_eq!(media_type_for("xlsx"), None);
    }

    #[test]
    fn test_new_rejects_unsupported_type() {
        let result = SelectedFile::new("readings.csv", b"date,value".to_vec());
        assert!(matches!(result, Err(FileSelectError::UnsupportedType(name)) if name == "readings.csv"));
    }

    #[test]
    fn test_new_keeps_name_and_payload() {
        let file = SelectedFile::new("bore-7.xlsx", b"PK\x03\x04".to_vec()).unwrap();
        assert_eq!(file.name(), "bore-7.xlsx");
        assert_eq!(file.media_type(), XLSX_MEDIA_TYPE);
        assert_eq!(file.contents(), b"PK\x03\x04");
        assert_eq!(file.len(), 4);
    }

    #[tokio::test]
    async fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extraction.xls");
        std::fs::write(&path, b"legacy workbook").unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(file.name(), "extraction.xls");
        assert_eq!(file.media_type(), XLS_MEDIA_TYPE);
        assert_eq!(file.contents(), b"legacy workbook");
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SelectedFile::from_path(dir.path().join("missing.xlsx")).await;
        assert!(matches!(result, Err(FileSelectError::Io { .. })));
    }
}
