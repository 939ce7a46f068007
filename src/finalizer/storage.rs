use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::session::SessionId;

pub const TEMP_FOLDER: &str = "temp";
pub const FINAL_FOLDER: &str = "final";

/// Recording storage layout under a single root:
///
/// ```text
/// {root}/temp/session_{id}/chunk_{00000..}.{ext}
/// {root}/final/session_{id}_{YYYYmmdd_HHMMSS}.{ext}
/// ```
///
/// Chunk names are zero-padded so lexicographic order is chronological order.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    chunk_extension: String,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, chunk_extension: impl Into<String>) -> Self {
        let chunk_extension: String = chunk_extension.into();
        Self {
            root: root.into(),
            chunk_extension: chunk_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_extension(&self) -> &str {
        &self.chunk_extension
    }

    pub fn temp_dir(&self, session_id: SessionId) -> PathBuf {
        self.root
            .join(TEMP_FOLDER)
            .join(format!("session_{}", session_id))
    }

    pub fn chunk_file_name(&self, index: u32) -> String {
        format!("chunk_{:05}.{}", index, self.chunk_extension)
    }

    pub fn chunk_path(&self, session_id: SessionId, index: u32) -> PathBuf {
        self.temp_dir(session_id).join(self.chunk_file_name(index))
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join(FINAL_FOLDER)
    }

    /// Final recording name at millisecond resolution. `attempt` > 0 adds a
    /// suffix for when that name is already taken.
    pub fn final_file_name(&self, session_id: SessionId, at: DateTime<Utc>, attempt: u32) -> String {
        let stamp = at.format("%Y%m%d_%H%M%S_%3f");
        match attempt {
            0 => format!("session_{}_{}.{}", session_id, stamp, self.chunk_extension),
            n => format!("session_{}_{}_{}.{}", session_id, stamp, n, self.chunk_extension),
        }
    }

    /// Path stored in the repository, relative to the storage root
    pub fn relative_final_path(&self, file_name: &str) -> String {
        format!("{}/{}", FINAL_FOLDER, file_name)
    }

    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    pub fn is_chunk(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext == self.chunk_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/srv/recordings", ".webm");
        assert_eq!(layout.chunk_extension(), "webm");
        assert_eq!(
            layout.temp_dir(SessionId(7)),
            PathBuf::from("/srv/recordings/temp/session_7")
        );
        assert_eq!(
            layout.chunk_path(SessionId(7), 12),
            PathBuf::from("/srv/recordings/temp/session_7/chunk_00012.webm")
        );

        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::milliseconds(89);
        let name = layout.final_file_name(SessionId(7), at, 0);
        assert_eq!(name, "session_7_20250304_050607_089.webm");
        assert_eq!(
            layout.relative_final_path(&name),
            "final/session_7_20250304_050607_089.webm"
        );
        assert_eq!(
            layout.final_file_name(SessionId(7), at, 2),
            "session_7_20250304_050607_089_2.webm"
        );
        assert_eq!(
            layout.resolve("final/x.webm"),
            PathBuf::from("/srv/recordings/final/x.webm")
        );
    }

    #[test]
    fn test_chunk_names_sort_chronologically() {
        let layout = StorageLayout::new("/r", "webm");
        let mut names: Vec<String> = [10, 2, 100, 0, 1]
            .into_iter()
            .map(|i| layout.chunk_file_name(i))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "chunk_00000.webm",
                "chunk_00001.webm",
                "chunk_00002.webm",
                "chunk_00010.webm",
                "chunk_00100.webm"
            ]
        );
    }

    #[test]
    fn test_is_chunk_filters_by_extension() {
        let layout = StorageLayout::new("/r", "webm");
        assert!(layout.is_chunk(Path::new("chunk_00000.webm")));
        assert!(!layout.is_chunk(Path::new("chunk_00000.webm.part")));
        assert!(!layout.is_chunk(Path::new("notes.txt")));
    }
}
