//! Reconciliation of alternate episode orderings with aired order
//!
//! Local files are bridged to the alternate ordering by position, and the
//! alternate ordering is bridged to aired order by episode id only.

use crate::file_operations::RenamePlan;
use crate::file_resolver::LocalFileEntry;
use crate::metadata_retrieval::{EpisodeId, EpisodeRecord, OrderingScheme};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, warn};

/// Errors that abort reconciliation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// Two sources that must describe the same episodes differ in size
    #[error("{left_label} ({left}) and {right_label} ({right}) differ in count!")]
    CountMismatch {
        left_label: String,
        left: usize,
        right_label: String,
        right: usize,
    },

    /// The alternate ordering references more files than exist locally
    #[error("episode ordering needs at least {required} local files but only {available} were found")]
    LocalFilesExhausted { required: usize, available: usize },
}

/// A non-fatal disagreement between catalog orderings or local files
///
/// The affected episode is left out of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogInconsistency {
    /// An aired episode has no counterpart in the alternate ordering
    MissingFromAlternate {
        episode: EpisodeRecord,
        ordering: OrderingScheme,
    },
    /// An alternate-order episode has no counterpart in aired order
    MissingFromAired { episode: EpisodeRecord },
    /// No local file was left to assign to the episode
    NoLocalFile { episode: EpisodeRecord },
}

impl fmt::Display for CatalogInconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogInconsistency::MissingFromAlternate { episode, ordering } => {
                write!(f, "{} does not exist in {}?!", episode, ordering)
            }
            CatalogInconsistency::MissingFromAired { episode } => {
                write!(f, "{} does not exist in aired order?!", episode)
            }
            CatalogInconsistency::NoLocalFile { episode } => {
                write!(f, "no local file is left for {}", episode)
            }
        }
    }
}

/// Settings for a single reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Series directory that receives the `Season N` directories
    pub root_dir: PathBuf,
    /// Filename prefix; empty for none
    pub label: String,
    /// The ordering the local files follow
    pub ordering: OrderingScheme,
    /// Continue past count mismatches instead of failing
    pub lenient: bool,
}

/// Outcome of a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub plan: RenamePlan,
    pub warnings: Vec<CatalogInconsistency>,
    /// Local files beyond the end of the alternate ordering, left alone
    pub unmapped_files: Vec<PathBuf>,
}

/// Checks that two sources have the same number of elements
///
/// In lenient mode a mismatch is only logged.
pub(crate) fn check_counts(
    left: usize,
    right: usize,
    left_label: &str,
    right_label: &str,
    lenient: bool,
) -> Result<(), ReconcileError> {
    if left == right {
        return Ok(());
    }

    let mismatch = ReconcileError::CountMismatch {
        left_label: left_label.to_string(),
        left,
        right_label: right_label.to_string(),
        right,
    };

    if lenient {
        warn!("{}; continuing because count checks are disabled", mismatch);
        Ok(())
    } else {
        error!("{}", mismatch);
        Err(mismatch)
    }
}

/// Builds the aired order file name for an episode
pub(crate) fn with_label(label: &str, rest: &str) -> String {
    if label.is_empty() {
        rest.to_string()
    } else {
        format!("{} - {}", label, rest)
    }
}

/// Maps locally ordered files onto aired order
///
/// `local_files` must follow the alternate ordering the way `alt_order`
/// lists it; the `i`-th file is taken to be the `i`-th alternate episode.
/// Each aired episode is then matched with its alternate twin by id and
/// moved to `Season {n}/{label} - s{n:02}e{m:02} --- {original name}`.
///
/// Specials (season 0) are ignored on both sides.
pub fn reconcile(
    local_files: &[LocalFileEntry],
    alt_order: Vec<EpisodeRecord>,
    aired_order: Vec<EpisodeRecord>,
    options: &ReconcileOptions,
) -> Result<Reconciliation, ReconcileError> {
    let mut alt_order: Vec<EpisodeRecord> =
        alt_order.into_iter().filter(|e| !e.is_special()).collect();
    let aired_order: Vec<EpisodeRecord> =
        aired_order.into_iter().filter(|e| !e.is_special()).collect();

    let alt_label = format!("thetvdb {}", options.ordering);

    check_counts(
        local_files.len(),
        alt_order.len(),
        "episodes on local system",
        &alt_label,
        options.lenient,
    )?;

    for (episode, file) in alt_order.iter_mut().zip(local_files) {
        episode.local_path = Some(file.path.clone());
    }

    let mut result = Reconciliation {
        unmapped_files: local_files
            .iter()
            .skip(alt_order.len())
            .map(|f| f.path.clone())
            .collect(),
        ..Default::default()
    };

    if !result.unmapped_files.is_empty() {
        warn!(
            "{} local file(s) have no {} episode and will be left alone",
            result.unmapped_files.len(),
            options.ordering
        );
    }

    let mut alt_by_id: HashMap<EpisodeId, &EpisodeRecord> = HashMap::new();
    for episode in &alt_order {
        alt_by_id.entry(episode.id).or_insert(episode);
    }

    let mut seen = HashSet::new();
    let aired: Vec<&EpisodeRecord> = aired_order
        .iter()
        .filter(|e| seen.insert(e.id))
        .collect();

    check_counts(
        aired.len(),
        alt_by_id.len(),
        "thetvdb aired",
        &alt_label,
        options.lenient,
    )?;

    for aired_episode in aired {
        let Some(alt_episode) = alt_by_id.get(&aired_episode.id) else {
            let warning = CatalogInconsistency::MissingFromAlternate {
                episode: aired_episode.clone(),
                ordering: options.ordering,
            };
            warn!("{}", warning);
            result.warnings.push(warning);
            continue;
        };

        let Some(local_path) = alt_episode.local_path.as_deref() else {
            let warning = CatalogInconsistency::NoLocalFile {
                episode: aired_episode.clone(),
            };
            warn!("{}", warning);
            result.warnings.push(warning);
            continue;
        };

        let season_dir = options
            .root_dir
            .join(format!("Season {}", aired_episode.season_number));
        let destination = season_dir.join(destination_name(
            &options.label,
            aired_episode,
            local_path,
        ));

        result.plan.require_directory(&season_dir);
        result.plan.push(local_path, destination);
    }

    Ok(result)
}

fn destination_name(label: &str, episode: &EpisodeRecord, local_path: &Path) -> String {
    let original = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    with_label(
        label,
        &format!(
            "s{:02}e{:02} --- {}",
            episode.season_number, episode.episode_number, original
        ),
    )
}
