//! tv_rename - Batch rename mangled season directories and episode files
//!
//! This library plans renames for three situations:
//!
//! - season directories or episode files that only need renumbering,
//! - episode files that follow a DVD, absolute or streaming ordering and
//!   should be renamed to aired order using TheTVDB,
//! - multipart files combining several aired episodes.
//!
//! Every planner returns a [`RenamePlan`]; nothing is touched on disk until
//! the plan is handed to [`execute_plan`].

mod cache;
mod config;
mod file_operations;
mod file_resolver;
mod metadata_retrieval;
mod multipart;
mod natural_sort;
mod reconcile;
mod renumber;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// Re-export error types
pub use cache::CacheError;
pub use config::ConfigError;
pub use file_operations::FileOperationError;
pub use file_resolver::FileResolverError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use reconcile::ReconcileError;
pub use renumber::RenumberError;

pub use cache::CacheStorage;
pub use config::Config;
pub use file_operations::{ExecutionMode, ExecutionSummary, RenamePlan, RenamePlanEntry, execute_plan};
pub use file_resolver::{
    DEFAULT_EXTENSIONS, ExtensionFilter, LocalFileEntry, list_directories, list_files,
    scan_for_episodes,
};
pub use metadata_retrieval::{
    CachedEpisodeSource, EpisodeId, EpisodeRecord, EpisodeSource, OrderingScheme, SessionToken,
    TvdbProvider,
};
pub use multipart::{EpisodeGroup, MultipartGrouping, group_multipart};
pub use natural_sort::{NaturalKey, SortOrder, SortToken, natural_key};
pub use reconcile::{CatalogInconsistency, ReconcileOptions, Reconciliation, reconcile};
pub use renumber::{
    discover_season_directories, plan_episode_files, plan_season_directories,
    season_number_from_dir_name,
};

/// How long a TheTVDB session token is reused
const TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// How long fetched episode lists are reused
const EPISODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Top-level error type for tv_rename operations
#[derive(Debug, Error)]
pub enum TvRenameError {
    /// Error loading configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error during file resolution
    #[error("File resolution error: {0}")]
    FileResolver(#[from] FileResolverError),

    /// Error during metadata retrieval
    #[error("Metadata retrieval error: {0}")]
    MetadataRetrieval(#[from] MetadataRetrievalError),

    /// Local files and the catalog disagree
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Error planning a renumbering
    #[error("Renumbering error: {0}")]
    Renumber(#[from] RenumberError),

    /// Error applying a plan
    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    /// Error during cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Parameters for renaming alternate-order files to aired order
#[derive(Debug, Clone)]
pub struct UnmangleRequest {
    /// TheTVDB id of the series
    pub series_id: u64,
    /// Series directory containing the season directories
    pub root_dir: PathBuf,
    /// The ordering the local files follow
    pub ordering: OrderingScheme,
    pub filter: ExtensionFilter,
    pub order: SortOrder,
    /// Continue past count mismatches
    pub ignore_count_mismatch: bool,
    /// Filename prefix, defaults to the series directory name
    pub prefix: Option<String>,
}

/// Parameters for consolidating multipart files
#[derive(Debug, Clone)]
pub struct MultipartRequest {
    /// TheTVDB id of the series
    pub series_id: u64,
    /// Series directory containing the season directories
    pub root_dir: PathBuf,
    /// The ordering the local files follow
    pub ordering: OrderingScheme,
    pub filter: ExtensionFilter,
    pub order: SortOrder,
    /// Filename prefix, defaults to the series directory name
    pub prefix: Option<String>,
}

/// Parameters for catalog-independent renumbering
#[derive(Debug, Clone)]
pub struct RenumberRequest {
    /// Directories to work on; empty to derive them from the working directory
    pub dirs: Vec<PathBuf>,
    /// Rename season directories instead of episode files
    pub directory_mode: bool,
    /// First season number assigned in directory mode
    pub start_index: u32,
    /// Season number for directories not named `Season N`
    pub season_override: Option<u32>,
    pub filter: ExtensionFilter,
    pub order: SortOrder,
    /// Filename prefix, defaults to the series directory name
    pub prefix: Option<String>,
}

impl Default for RenumberRequest {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            directory_mode: false,
            start_index: 1,
            season_override: None,
            filter: ExtensionFilter::default(),
            order: SortOrder::Natural,
            prefix: None,
        }
    }
}

/// Plans and failures of a renumbering, per directory
#[derive(Debug, Default)]
pub struct RenumberOutcome {
    pub plans: Vec<(PathBuf, RenamePlan)>,
    pub failures: Vec<(PathBuf, RenumberError)>,
}

/// Creates a TheTVDB provider that keeps its session token in the temp directory
///
/// The token is stored per user so that several users of one machine do not
/// share credentials. A token cache that cannot be opened is skipped.
pub fn connect_tvdb(config: &Config) -> TvdbProvider {
    let provider = TvdbProvider::new(config);
    let dir = std::env::temp_dir().join("tv_rename");

    match CacheStorage::open_in(&dir, Some(TOKEN_TTL)) {
        Ok(cache) => provider.with_token_cache(cache, format!("{}_tvdb", current_user())),
        Err(e) => {
            debug!("not caching tvdb session tokens: {}", e);
            provider
        }
    }
}

/// Opens the persistent one-day cache of fetched episode lists
pub fn open_episode_cache() -> Result<CacheStorage<Vec<EpisodeRecord>>, CacheError> {
    CacheStorage::open("episodes", Some(EPISODE_TTL))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fetches the `ordering` and the aired episode lists of a series
///
/// Aired order is only fetched once when it is also the requested ordering.
fn fetch_orderings<S>(
    source: &S,
    series_id: u64,
    ordering: OrderingScheme,
) -> Result<(Vec<EpisodeRecord>, Vec<EpisodeRecord>), MetadataRetrievalError>
where
    S: EpisodeSource + ?Sized,
{
    let alt_order = source.list_episodes(series_id, ordering)?;
    let aired_order = if ordering.is_alternate() {
        source.list_episodes(series_id, OrderingScheme::Aired)?
    } else {
        alt_order.clone()
    };

    Ok((alt_order, aired_order))
}

/// Plans renaming alternate-order episode files to aired order
///
/// Scans `root_dir/*/*`, fetches the alternate and aired orderings of the
/// series from `source` and reconciles them.
///
/// # Examples
///
/// ```no_run
/// use tv_rename::{
///     Config, ExecutionMode, ExtensionFilter, OrderingScheme, SortOrder, UnmangleRequest,
///     connect_tvdb, execute_plan, plan_unmangle,
/// };
/// use std::path::PathBuf;
///
/// let provider = connect_tvdb(&Config::from_env()?);
/// let request = UnmangleRequest {
///     series_id: 81189,
///     root_dir: PathBuf::from("/tv/Breaking Bad"),
///     ordering: OrderingScheme::Dvd,
///     filter: ExtensionFilter::default(),
///     order: SortOrder::Natural,
///     ignore_count_mismatch: false,
///     prefix: None,
/// };
///
/// let reconciliation = plan_unmangle(&provider, &request)?;
/// execute_plan(&reconciliation.plan, ExecutionMode::DryRun)?;
/// # Ok::<(), tv_rename::TvRenameError>(())
/// ```
pub fn plan_unmangle<S>(source: &S, request: &UnmangleRequest) -> Result<Reconciliation, TvRenameError>
where
    S: EpisodeSource + ?Sized,
{
    let root_dir = request.root_dir.canonicalize()?;
    let local_files = scan_for_episodes(&root_dir, &request.filter, request.order)?;
    debug!("found {} local episode files", local_files.len());

    let (alt_order, aired_order) = fetch_orderings(source, request.series_id, request.ordering)?;

    let options = ReconcileOptions {
        label: request.prefix.clone().unwrap_or_else(|| dir_name(&root_dir)),
        root_dir,
        ordering: request.ordering,
        lenient: request.ignore_count_mismatch,
    };

    Ok(reconcile(&local_files, alt_order, aired_order, &options)?)
}

/// Plans renaming multipart files to the aired episode range they contain
///
/// # Returns
///
/// The grouping together with the plan renaming each grouped file in place.
pub fn plan_multipart<S>(
    source: &S,
    request: &MultipartRequest,
) -> Result<(MultipartGrouping, RenamePlan), TvRenameError>
where
    S: EpisodeSource + ?Sized,
{
    let root_dir = request.root_dir.canonicalize()?;
    let local_files = scan_for_episodes(&root_dir, &request.filter, request.order)?;

    let (alt_order, aired_order) = fetch_orderings(source, request.series_id, request.ordering)?;

    let grouping = group_multipart(&local_files, &alt_order, &aired_order)?;
    let plan = grouping.clone().into_plan(request.prefix.as_deref());

    Ok((grouping, plan))
}

/// Plans renumbering of season directories or episode files
///
/// Without explicit directories, directory mode works on `cwd` itself and
/// file mode on every `Season N` directory inside `cwd`. Each directory is
/// planned independently; a directory that fails is reported in
/// [`RenumberOutcome::failures`] and does not stop the others.
pub fn plan_renumber(request: &RenumberRequest, cwd: &Path) -> Result<RenumberOutcome, RenumberError> {
    let dirs = if !request.dirs.is_empty() {
        request.dirs.clone()
    } else if request.directory_mode {
        vec![cwd.to_path_buf()]
    } else {
        discover_season_directories(cwd)?
    };

    if dirs.is_empty() {
        return Err(RenumberError::NoTargetDirectories(cwd.to_path_buf()));
    }

    if request.season_override.is_some() && !request.directory_mode && dirs.len() > 1 {
        return Err(RenumberError::SeasonOverrideWithMultipleDirs);
    }

    let mut outcome = RenumberOutcome::default();

    for dir in dirs {
        let planned = if request.directory_mode {
            plan_season_directories(&dir, request.start_index, request.order)
        } else {
            plan_episode_files(
                &dir,
                request.season_override,
                &request.filter,
                request.order,
                request.prefix.as_deref(),
            )
        };

        match planned {
            Ok(plan) => outcome.plans.push((dir, plan)),
            Err(e) => outcome.failures.push((dir, e)),
        }
    }

    Ok(outcome)
}
