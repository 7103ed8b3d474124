use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during file operations
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("More than one file would be renamed to {0}")]
    DuplicateDestination(PathBuf),

    #[error("Parent directory of {0} does not exist and is not planned to be created")]
    MissingParent(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    #[error("Failed to rename {} to {}: {source}", .from.display(), .to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// A single planned rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlanEntry {
    /// Source file path
    pub source: PathBuf,
    /// Destination file path
    pub destination: PathBuf,
}

impl RenamePlanEntry {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Returns true if the rename would leave the file where it is
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }
}

/// An ordered list of renames plus the directories they need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    /// Directories to create before any rename, in creation order
    pub directories: Vec<PathBuf>,
    /// Renames, applied in order
    pub entries: Vec<RenamePlanEntry>,
}

impl RenamePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rename to the plan
    pub fn push(&mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) {
        self.entries.push(RenamePlanEntry::new(source, destination));
    }

    /// Records that `dir` must exist before the renames run
    pub fn require_directory(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.directories.contains(&dir) {
            self.directories.push(dir);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that the plan can be applied without clobbering any file
    ///
    /// A destination may already exist only if an earlier entry of this plan
    /// moves that file away first.
    pub fn validate(&self) -> Result<(), FileOperationError> {
        let mut vacated: HashSet<&Path> = HashSet::new();
        let mut claimed: HashSet<&Path> = HashSet::new();

        for entry in self.entries.iter().filter(|e| !e.is_noop()) {
            let destination = entry.destination.as_path();

            if !claimed.insert(destination) {
                return Err(FileOperationError::DuplicateDestination(
                    entry.destination.clone(),
                ));
            }

            if destination.exists() && !vacated.contains(destination) {
                return Err(FileOperationError::DestinationExists(
                    entry.destination.clone(),
                ));
            }

            if let Some(parent) = destination.parent() {
                let planned = self.directories.iter().any(|d| d == parent);
                if !parent.as_os_str().is_empty() && !parent.is_dir() && !planned {
                    return Err(FileOperationError::MissingParent(entry.destination.clone()));
                }
            }

            vacated.insert(entry.source.as_path());
            vacated.remove(destination);
        }

        Ok(())
    }
}

/// Whether a plan is applied or only reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Log every action without touching the filesystem
    DryRun,
    /// Create directories and rename files
    Apply,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Apply
        }
    }
}

/// Counts of what a plan execution did (or would have done)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub directories_created: usize,
    pub renamed: usize,
    pub unchanged: usize,
}

/// Executes a rename plan
///
/// The plan is validated before anything is touched. Renames are applied
/// sequentially and the first failure aborts the run; renames that already
/// happened are not rolled back.
pub fn execute_plan(
    plan: &RenamePlan,
    mode: ExecutionMode,
) -> Result<ExecutionSummary, FileOperationError> {
    plan.validate()?;

    let mut summary = ExecutionSummary::default();

    for dir in &plan.directories {
        if dir.is_dir() {
            continue;
        }

        match mode {
            ExecutionMode::DryRun => info!("Would create directory \"{}\"", dir.display()),
            ExecutionMode::Apply => {
                info!("Creating directory \"{}\"", dir.display());
                fs::create_dir_all(dir).map_err(|e| FileOperationError::CreateDirectoryFailed {
                    path: dir.clone(),
                    source: e,
                })?;
            }
        }
        summary.directories_created += 1;
    }

    for entry in &plan.entries {
        if entry.is_noop() {
            debug!("\"{}\" is already named correctly", entry.source.display());
            summary.unchanged += 1;
            continue;
        }

        match mode {
            ExecutionMode::DryRun => info!(
                "Would rename \"{}\" -> \"{}\"",
                entry.source.display(),
                entry.destination.display()
            ),
            ExecutionMode::Apply => {
                info!(
                    "Renaming \"{}\" -> \"{}\"",
                    entry.source.display(),
                    entry.destination.display()
                );
                fs::rename(&entry.source, &entry.destination).map_err(|e| {
                    FileOperationError::RenameFailed {
                        from: entry.source.clone(),
                        to: entry.destination.clone(),
                        source: e,
                    }
                })?;
            }
        }
        summary.renamed += 1;
    }

    Ok(summary)
}
