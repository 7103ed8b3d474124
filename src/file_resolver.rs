//! File resolver module for locating local episode files
//!
//! Episode files are expected one level below season directories
//! (`root/Season 1/episode.mkv`). Nothing deeper is considered.

use crate::natural_sort::SortOrder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Video extensions targeted when no override is given
pub const DEFAULT_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

/// Errors that can occur during file resolution
#[derive(Debug, Error)]
pub enum FileResolverError {
    /// Path is not a directory
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Failed to read directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),
}

/// Set of file extensions to match, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    /// Lower-cased extensions without the leading dot
    extensions: Vec<String>,
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ExtensionFilter {
    /// Builds a filter that replaces the default set with `overrides`
    ///
    /// Extensions may be given with or without a leading dot. An empty
    /// iterator yields the default set.
    pub fn from_overrides<I, S>(overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = overrides
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if extensions.is_empty() {
            Self::default()
        } else {
            Self { extensions }
        }
    }

    /// The normalized extensions of this filter
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if the path's extension is in the set
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// A local episode file discovered below a season directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// Name of the directory containing the file
    pub season_dir: String,
    /// File extension as it appears on disk (without the dot)
    pub extension: String,
}

impl LocalFileEntry {
    fn from_path(path: PathBuf) -> Self {
        let season_dir = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            season_dir,
            extension,
        }
    }

    /// The file name of the entry
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Finds all episode files in the season directories of `root_dir`
///
/// Only files matching `root_dir/*/*` are returned; files directly inside
/// `root_dir` and anything nested deeper are ignored.
///
/// # Returns
///
/// The matching files, ordered by their full path using `order`.
pub fn scan_for_episodes(
    root_dir: &Path,
    filter: &ExtensionFilter,
    order: SortOrder,
) -> Result<Vec<LocalFileEntry>, FileResolverError> {
    debug!(
        "scanning '{}' for {} files",
        root_dir.display(),
        filter.extensions().join(", ")
    );
    let mut paths = Vec::new();

    for season_dir in child_paths(root_dir)? {
        if !season_dir.is_dir() {
            continue;
        }

        paths.extend(
            child_paths(&season_dir)?
                .into_iter()
                .filter(|p| p.is_file() && filter.matches(p)),
        );
    }

    order.sort_paths(&mut paths);

    Ok(paths.into_iter().map(LocalFileEntry::from_path).collect())
}

/// Lists files directly inside `dir` that match `filter`
pub fn list_files(
    dir: &Path,
    filter: &ExtensionFilter,
    order: SortOrder,
) -> Result<Vec<PathBuf>, FileResolverError> {
    let mut files: Vec<PathBuf> = child_paths(dir)?
        .into_iter()
        .filter(|p| p.is_file() && filter.matches(p))
        .collect();

    order.sort_paths(&mut files);
    Ok(files)
}

/// Lists the subdirectories directly inside `dir`
pub fn list_directories(dir: &Path, order: SortOrder) -> Result<Vec<PathBuf>, FileResolverError> {
    let mut dirs: Vec<PathBuf> = child_paths(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();

    order.sort_paths(&mut dirs);
    Ok(dirs)
}

fn child_paths(dir_path: &Path) -> Result<Vec<PathBuf>, FileResolverError> {
    if !dir_path.is_dir() {
        return Err(FileResolverError::NotADirectory(dir_path.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir_path).map_err(|e| FileResolverError::ReadDirectoryFailed {
        path: dir_path.to_path_buf(),
        source: e,
    })? {
        paths.push(entry?.path());
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn names(entries: &[LocalFileEntry]) -> Vec<String> {
        entries.iter().map(LocalFileEntry::file_name).collect()
    }

    #[test]
    fn test_scan_nonexistent_directory() {
        let result = scan_for_episodes(
            Path::new("/nonexistent/path/that/does/not/exist"),
            &ExtensionFilter::default(),
            SortOrder::Natural,
        );
        assert!(matches!(result, Err(FileResolverError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_only_considers_season_depth() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("top.mkv"));
        touch(&root.join("Season 1/ep1.mkv"));
        touch(&root.join("Season 1/extras/deep.mkv"));

        let found = scan_for_episodes(root, &ExtensionFilter::default(), SortOrder::Natural).unwrap();
        assert_eq!(names(&found), vec!["ep1.mkv"]);
        assert_eq!(found[0].season_dir, "Season 1");
        assert_eq!(found[0].extension, "mkv");
    }

    #[test]
    fn test_extension_filter_is_case_insensitive_and_exclusive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("Season 1/Show.MKV"));
        touch(&root.join("Season 1/Show.srt"));

        let found = scan_for_episodes(root, &ExtensionFilter::default(), SortOrder::Natural).unwrap();
        assert_eq!(names(&found), vec!["Show.MKV"]);

        let subtitles = ExtensionFilter::from_overrides([".srt"]);
        let found = scan_for_episodes(root, &subtitles, SortOrder::Natural).unwrap();
        assert_eq!(names(&found), vec!["Show.srt"]);
    }

    #[test]
    fn test_from_overrides_normalizes() {
        let filter = ExtensionFilter::from_overrides(["SRT", ".Ass"]);
        assert_eq!(filter.extensions(), &["srt".to_string(), "ass".to_string()]);
        assert_eq!(
            ExtensionFilter::from_overrides(Vec::<String>::new()),
            ExtensionFilter::default()
        );
    }

    #[test]
    fn test_scan_orders_across_seasons() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("Season 2/Episode 1.mkv"));
        touch(&root.join("Season 1/Episode 10.mkv"));
        touch(&root.join("Season 1/Episode 2.mkv"));

        let natural = scan_for_episodes(root, &ExtensionFilter::default(), SortOrder::Natural).unwrap();
        assert_eq!(
            names(&natural),
            vec!["Episode 2.mkv", "Episode 10.mkv", "Episode 1.mkv"]
        );

        let lexicographic =
            scan_for_episodes(root, &ExtensionFilter::default(), SortOrder::Lexicographic).unwrap();
        assert_eq!(
            names(&lexicographic),
            vec!["Episode 10.mkv", "Episode 2.mkv", "Episode 1.mkv"]
        );
    }

    #[test]
    fn test_list_directories_skips_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("b")).unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        touch(&temp.path().join("c.mkv"));

        let dirs = list_directories(temp.path(), SortOrder::Natural).unwrap();
        assert_eq!(dirs, vec![temp.path().join("a"), temp.path().join("b")]);
    }
}
