use std::path::{Path, PathBuf};

use anyhow::Context;
use inquire::error::InquireError;

use crate::codec::ExportFile;

/// Raw file contents plus the content type the file declares.
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn read(path: &Path, content_type: Option<String>) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        Ok(PickedFile {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            content_type: content_type.unwrap_or_else(|| content_type_of(path).to_string()),
            bytes,
        })
    }
}

pub fn content_type_of(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

pub trait FilePicker: Send + Sync {
    /// `Ok(None)` when the user backs out.
    fn pick(&self) -> anyhow::Result<Option<PickedFile>>;
}

pub trait Downloader: Send + Sync {
    fn download(&self, file: &ExportFile) -> anyhow::Result<PathBuf>;
}

/// Always yields the file it was built with.
pub struct PathPicker {
    pub path: PathBuf,
    pub content_type: Option<String>,
}

impl FilePicker for PathPicker {
    fn pick(&self) -> anyhow::Result<Option<PickedFile>> {
        PickedFile::read(&self.path, self.content_type.clone()).map(Some)
    }
}

/// Asks for a path on the terminal.
pub struct PromptPicker;

impl FilePicker for PromptPicker {
    fn pick(&self) -> anyhow::Result<Option<PickedFile>> {
        let answer = inquire::Text::new("File to import (.csv, .json or .html):").prompt();

        let path = match answer {
            Ok(path) if path.trim().is_empty() => return Ok(None),
            Ok(path) => PathBuf::from(path.trim()),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(None)
            }
            Err(err) => anyhow::bail!("An error occurred: {err}"),
        };

        PickedFile::read(&path, None).map(Some)
    }
}

/// Writes exports into a directory, keeping the suggested file name.
pub struct DirDownloader {
    pub dir: PathBuf,
}

impl Downloader for DirDownloader {
    fn download(&self, file: &ExportFile) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file.filename);
        std::fs::write(&path, &file.content)
            .with_context(|| format!("failed to write {}", path.display()))?;

        log::info!("saved {} ({})", path.display(), file.mime);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_of(Path::new("a/b.CSV")), "text/csv");
        assert_eq!(content_type_of(Path::new("export.json")), "application/json");
        assert_eq!(content_type_of(Path::new("bookmarks.htm")), "text/html");
        assert_eq!(content_type_of(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn test_path_picker_and_downloader() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader = DirDownloader {
            dir: tmp.path().join("exports"),
        };

        let file = ExportFile {
            filename: "bookmarks-2024-01-01.json".to_string(),
            mime: "application/json".to_string(),
            count: 0,
            content: "[]".to_string(),
        };
        let path = downloader.download(&file).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        let picked = PathPicker {
            path,
            content_type: None,
        }
        .pick()
        .unwrap()
        .unwrap();
        assert_eq!(picked.name, "bookmarks-2024-01-01.json");
        assert_eq!(picked.content_type, "application/json");
        assert_eq!(picked.bytes, b"[]");
    }
}
