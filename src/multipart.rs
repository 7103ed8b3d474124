//! Multipart episode consolidation
//!
//! Some releases combine several aired episodes into one file. Their
//! alternate ordering lists the combined episode several times in a row with
//! an unchanged (episode, season) pair; each run of such entries belongs
//! to one local file.

use crate::file_operations::RenamePlan;
use crate::file_resolver::LocalFileEntry;
use crate::metadata_retrieval::{EpisodeId, EpisodeRecord};
use crate::reconcile::{CatalogInconsistency, ReconcileError, with_label};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Associates a group of aired episodes with the local file containing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeGroup {
    /// The local file
    pub path: PathBuf,
    /// Season of the alternate-order entry that opened the group
    pub season_number: u32,
    /// Aired episode numbers in first-seen order
    pub mapped_episodes: Vec<u32>,
}

impl EpisodeGroup {
    /// Formats the episode part of the file name
    ///
    /// A single episode yields `e07`; several yield the `e03-e04` range
    /// spanning the lowest to the highest number.
    pub fn episode_label(&self) -> String {
        let min = self.mapped_episodes.iter().min();
        let max = self.mapped_episodes.iter().max();

        match (min, max) {
            (Some(min), Some(max)) if self.mapped_episodes.len() > 1 => {
                format!("e{:02}-e{:02}", min, max)
            }
            (Some(only), _) => format!("e{:02}", only),
            _ => String::new(),
        }
    }

    /// New path of the file, in the directory it already lives in
    ///
    /// The name starts with `prefix`, or with the name of the series
    /// directory (the file's grandparent) when no prefix is given.
    pub fn destination(&self, prefix: Option<&str>) -> PathBuf {
        let parent = self.path.parent().unwrap_or(Path::new(""));
        let label = match prefix {
            Some(prefix) => prefix.to_string(),
            None => parent
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let suffix = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        parent.join(with_label(
            &label,
            &format!(
                "s{:02}{}{}",
                self.season_number,
                self.episode_label(),
                suffix
            ),
        ))
    }
}

/// Outcome of multipart grouping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartGrouping {
    /// One group per local file, in local file order
    pub groups: Vec<EpisodeGroup>,
    /// Local files no alternate-order entry reached
    pub unmapped_files: Vec<PathBuf>,
    pub warnings: Vec<CatalogInconsistency>,
}

impl MultipartGrouping {
    /// Builds the plan renaming every grouped file in place
    pub fn into_plan(self, prefix: Option<&str>) -> RenamePlan {
        let mut plan = RenamePlan::new();
        for group in &self.groups {
            plan.push(&group.path, group.destination(prefix));
        }
        plan
    }
}

/// Groups alternate-order episodes by the local file containing them
///
/// The first alternate entry maps to the first local file; every time the
/// (episode, season) pair changes from the previous entry, the next local
/// file is used. Each grouped entry contributes its aired episode number,
/// looked up by id.
///
/// Halves of one file that are not adjacent in the alternate ordering end
/// up in separate groups.
pub fn group_multipart(
    local_files: &[LocalFileEntry],
    alt_order: &[EpisodeRecord],
    aired_order: &[EpisodeRecord],
) -> Result<MultipartGrouping, ReconcileError> {
    let id_to_aired: HashMap<EpisodeId, &EpisodeRecord> = aired_order
        .iter()
        .filter(|e| !e.is_special())
        .map(|e| (e.id, e))
        .collect();

    let mut result = MultipartGrouping::default();
    let mut previous: Option<(u32, u32)> = None;
    let mut file_index = 0;

    for episode in alt_order.iter().filter(|e| !e.is_special()) {
        let key = (episode.episode_number, episode.season_number);
        match previous {
            Some(prev) if prev != key => file_index += 1,
            _ => {}
        }
        previous = Some(key);

        let Some(file) = local_files.get(file_index) else {
            return Err(ReconcileError::LocalFilesExhausted {
                required: file_index + 1,
                available: local_files.len(),
            });
        };

        let Some(aired) = id_to_aired.get(&episode.id) else {
            let warning = CatalogInconsistency::MissingFromAired {
                episode: episode.clone(),
            };
            warn!("{}", warning);
            result.warnings.push(warning);
            continue;
        };

        match result.groups.last_mut() {
            Some(group) if group.path == file.path => {
                group.mapped_episodes.push(aired.episode_number)
            }
            _ => result.groups.push(EpisodeGroup {
                path: file.path.clone(),
                season_number: episode.season_number,
                mapped_episodes: vec![aired.episode_number],
            }),
        }
    }

    let consumed = if previous.is_some() { file_index + 1 } else { 0 };
    result.unmapped_files = local_files[consumed.min(local_files.len())..]
        .iter()
        .map(|f| f.path.clone())
        .collect();

    if !result.unmapped_files.is_empty() {
        warn!(
            "{} local file(s) were not reached by the episode ordering and will be left alone",
            result.unmapped_files.len()
        );
    }

    Ok(result)
}
