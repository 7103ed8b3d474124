//! Catalog-independent renumbering of season directories and episode files

use crate::file_operations::RenamePlan;
use crate::file_resolver::{ExtensionFilter, FileResolverError, list_directories, list_files};
use crate::natural_sort::SortOrder;
use crate::reconcile::with_label;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static SEASON_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^season (\d+)").expect("season pattern is valid"));

/// Errors that can occur while planning a renumbering
#[derive(Debug, Error)]
pub enum RenumberError {
    /// Neither the directory name nor an override gives the season number
    #[error("'{}' does not follow the standard format (e.g. 'Season 1') and no season number override was given", .0.display())]
    SeasonUndetermined(PathBuf),

    /// A season override is ambiguous across several directories
    #[error("a season number override makes no sense with multiple season directories")]
    SeasonOverrideWithMultipleDirs,

    /// No directory to work on was given or found
    #[error("no target directory was specified and none was found in {}", .0.display())]
    NoTargetDirectories(PathBuf),

    #[error(transparent)]
    FileResolver(#[from] FileResolverError),

    /// Failed to resolve the directory's parent for the filename prefix
    #[error("Failed to resolve {}: {source}", .path.display())]
    ResolveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Extracts the season number from a `Season N` directory name
///
/// Returns `None` for season 0 as well as for names not matching the pattern.
pub fn season_number_from_dir_name(name: &str) -> Option<u32> {
    SEASON_DIR
        .captures(name)
        .and_then(|c| c[1].parse().ok())
        .filter(|n| *n > 0)
}

/// Lists the subdirectories of `dir` named like `Season N`
pub fn discover_season_directories(dir: &Path) -> Result<Vec<PathBuf>, FileResolverError> {
    Ok(list_directories(dir, SortOrder::Natural)?
        .into_iter()
        .filter(|d| {
            d.file_name()
                .is_some_and(|n| SEASON_DIR.is_match(&n.to_string_lossy()))
        })
        .collect())
}

/// Plans renaming every subdirectory of `series_dir` to `Season {i}`
///
/// Directories are numbered in `order`, starting at `start_index`.
pub fn plan_season_directories(
    series_dir: &Path,
    start_index: u32,
    order: SortOrder,
) -> Result<RenamePlan, RenumberError> {
    let mut plan = RenamePlan::new();

    for (dir, index) in list_directories(series_dir, order)?.into_iter().zip(start_index..) {
        plan.push(&dir, series_dir.join(format!("Season {}", index)));
    }

    Ok(plan)
}

/// Plans renaming the episode files of one season directory
///
/// Files are numbered in `order` starting at 1 and renamed to
/// `{prefix} - s{season:02}e{i:02}{suffix}`. The prefix defaults to the
/// name of the series directory containing `season_dir`.
pub fn plan_episode_files(
    season_dir: &Path,
    season_override: Option<u32>,
    filter: &ExtensionFilter,
    order: SortOrder,
    prefix: Option<&str>,
) -> Result<RenamePlan, RenumberError> {
    let season = season_dir
        .file_name()
        .and_then(|n| season_number_from_dir_name(&n.to_string_lossy()))
        .or(season_override)
        .ok_or_else(|| RenumberError::SeasonUndetermined(season_dir.to_path_buf()))?;

    let label = match prefix {
        Some(prefix) => prefix.to_string(),
        None => series_name_of(season_dir)?,
    };

    let mut plan = RenamePlan::new();
    for (file, index) in list_files(season_dir, filter, order)?.into_iter().zip(1u32..) {
        let suffix = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let name = with_label(&label, &format!("s{:02}e{:02}{}", season, index, suffix));
        plan.push(&file, season_dir.join(name));
    }

    Ok(plan)
}

fn series_name_of(season_dir: &Path) -> Result<String, RenumberError> {
    let resolved = season_dir
        .canonicalize()
        .map_err(|e| RenumberError::ResolveFailed {
            path: season_dir.to_path_buf(),
            source: e,
        })?;

    Ok(resolved
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default())
}
