//! File handler for JSON data files written by the registry.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Writes JSON data files into one directory.
#[derive(Debug, Clone)]
pub struct FileHandler {
    /// Directory for file storage.
    pub directory: PathBuf,
}

impl FileHandler {
    /// Create a new `FileHandler` for the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Full path of `filename` inside the handler's directory.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.directory.join(filename)
    }

    /// Save `data` as 2-space pretty JSON, replacing any existing file.
    ///
    /// Creates the directory if it does not exist. Returns the path written.
    pub fn save<T: Serialize + ?Sized>(
        &self,
        filename: &str,
        data: &T,
    ) -> std::io::Result<PathBuf> {
        let dir: &Path = &self.directory;
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let path = self.path_for(filename);
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&path, content)?;
        Ok(path)
    }
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileHandler::new(dir.path().join("a").join("b"));
        let path = handler
            .save("data.json", &serde_json::json!({"k": [1, 2]}))
            .unwrap();
        assert_eq!(path, dir.path().join("a").join("b").join("data.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"k\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileHandler::new(dir.path());
        handler.save("x.json", &1).unwrap();
        let path = handler.save("x.json", &2).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "2");
    }
}
