use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tv_rename::{
    CachedEpisodeSource, Config, EpisodeSource, ExecutionMode, ExtensionFilter,
    MultipartRequest, OrderingScheme, RenamePlan, RenumberRequest, SortOrder, TvRenameError,
    TvdbProvider, UnmangleRequest, connect_tvdb, execute_plan, open_episode_cache, plan_multipart,
    plan_renumber, plan_unmangle,
};

/// Batch rename mangled season dirs and/or episode files
#[derive(Parser)]
#[command(name = "tv_rename", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(Args)]
struct CommonArgs {
    /// Use lexicographical sort instead of natural sort
    #[arg(short = 'l')]
    lexicographic: bool,

    /// Dry run, don't actually rename any files/dirs
    #[arg(short = 's', long = "dry-run")]
    dry_run: bool,

    /// The file extensions to target, may be repeated [default: mkv, mp4, avi]
    #[arg(short = 'x', value_name = "EXT")]
    extensions: Vec<String>,

    /// Prefix for renamed files [default: the series directory name]
    #[arg(long)]
    prefix: Option<String>,
}

impl CommonArgs {
    fn filter(&self) -> ExtensionFilter {
        ExtensionFilter::from_overrides(&self.extensions)
    }

    fn order(&self) -> SortOrder {
        SortOrder::from_flag(self.lexicographic)
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::from_dry_run(self.dry_run)
    }
}

/// Options of the subcommands that query thetvdb
#[derive(Args)]
struct SeriesArgs {
    /// The series id of the show in question on thetvdb
    series_id: u64,

    /// The series directory to work on
    #[arg(default_value = ".")]
    root_dir: PathBuf,

    /// Treat input as absolute ordering
    #[arg(long, conflicts_with = "streaming")]
    absolute: bool,

    /// Treat input as streaming ordering
    #[arg(long)]
    streaming: bool,

    /// Fetch episodes from thetvdb even if they are cached
    #[arg(long)]
    refresh: bool,

    /// Rename without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

impl SeriesArgs {
    fn ordering(&self) -> OrderingScheme {
        OrderingScheme::from_flags(self.absolute, self.streaming)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rename episode files or Season directories by their sort order
    Renumber {
        #[command(flatten)]
        common: CommonArgs,

        /// Treat the input dir as a dir containing season dirs to rename
        #[arg(short = 'd')]
        directories: bool,

        /// The season number to start enumerating directories at when -d is passed
        #[arg(short = 'i', default_value_t = 1, value_name = "SEASON")]
        start_index: u32,

        /// The season number to use when renaming episode files. Ignored if -d is passed
        #[arg(short = 'n', value_name = "SEASON_NUMBER")]
        season: Option<u32>,

        /// The directories to work on
        dirs: Vec<PathBuf>,
    },
    /// Rename dvd/absolute/streaming ordered episodes to aired order
    Unmangle {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        series: SeriesArgs,

        /// Ignore mismatches between the episode count on thetvdb and the local filesystem
        #[arg(short = 'i', long = "ignore-count-mismatch")]
        ignore_count_mismatch: bool,
    },
    /// Rename combined, multipart episodes to the aired episodes they contain
    Multipart {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        series: SeriesArgs,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "tv_rename=debug"
    } else {
        "tv_rename=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Builds the thetvdb-backed episode source, cached unless `refresh` is set
fn episode_source(refresh: bool) -> Result<Box<dyn EpisodeSource>, TvRenameError> {
    let provider: TvdbProvider = connect_tvdb(&Config::from_env()?);

    if refresh {
        return Ok(Box::new(provider));
    }

    Ok(match open_episode_cache() {
        Ok(cache) => Box::new(CachedEpisodeSource::new(provider, cache)),
        Err(e) => {
            warn!("episode cache unavailable, querying thetvdb directly: {}", e);
            Box::new(provider)
        }
    })
}

/// Asks before touching the filesystem when running interactively
fn confirmed(plan: &RenamePlan, mode: ExecutionMode, yes: bool) -> Result<bool, TvRenameError> {
    if mode == ExecutionMode::DryRun || yes || plan.is_empty() || !io::stdin().is_terminal() {
        return Ok(true);
    }

    for entry in &plan.entries {
        info!(
            "Planned \"{}\" -> \"{}\"",
            entry.source.display(),
            entry.destination.display()
        );
    }

    dialoguer::Confirm::new()
        .with_prompt(format!("Rename {} file(s)?", plan.len()))
        .default(false)
        .interact()
        .map_err(|e| TvRenameError::Io(io::Error::other(e.to_string())))
}

fn apply(plan: &RenamePlan, mode: ExecutionMode, yes: bool) -> Result<(), TvRenameError> {
    plan.validate()?;

    if !confirmed(plan, mode, yes)? {
        info!("Aborted, nothing was renamed");
        return Ok(());
    }

    let summary = execute_plan(plan, mode)?;
    info!(
        "{} file(s) {}, {} already named correctly",
        summary.renamed,
        if mode == ExecutionMode::DryRun {
            "would be renamed"
        } else {
            "renamed"
        },
        summary.unchanged
    );
    Ok(())
}

fn run_unmangle(
    common: &CommonArgs,
    series: &SeriesArgs,
    ignore_count_mismatch: bool,
) -> Result<(), TvRenameError> {
    let source = episode_source(series.refresh)?;
    let request = UnmangleRequest {
        series_id: series.series_id,
        root_dir: series.root_dir.clone(),
        ordering: series.ordering(),
        filter: common.filter(),
        order: common.order(),
        ignore_count_mismatch,
        prefix: common.prefix.clone(),
    };

    let reconciliation = plan_unmangle(source.as_ref(), &request)?;
    if !reconciliation.warnings.is_empty() {
        warn!(
            "{} episode(s) were left out because of catalog inconsistencies",
            reconciliation.warnings.len()
        );
    }

    apply(&reconciliation.plan, common.mode(), series.yes)
}

fn run_multipart(common: &CommonArgs, series: &SeriesArgs) -> Result<(), TvRenameError> {
    let source = episode_source(series.refresh)?;
    let request = MultipartRequest {
        series_id: series.series_id,
        root_dir: series.root_dir.clone(),
        ordering: series.ordering(),
        filter: common.filter(),
        order: common.order(),
        prefix: common.prefix.clone(),
    };

    let (_, plan) = plan_multipart(source.as_ref(), &request)?;
    apply(&plan, common.mode(), series.yes)
}

/// Returns the number of directories that could not be processed
fn run_renumber(common: &CommonArgs, request: RenumberRequest) -> Result<usize, TvRenameError> {
    let cwd = std::env::current_dir()?;
    let outcome = plan_renumber(&request, &cwd)?;
    let mut failed = outcome.failures.len();

    for (dir, e) in &outcome.failures {
        error!("Skipping '{}': {}", dir.display(), e);
    }

    for (dir, plan) in &outcome.plans {
        info!("Now processing '{}'", dir.display());
        if let Err(e) = execute_plan(plan, common.mode()) {
            error!("Failed to process '{}': {}", dir.display(), e);
            failed += 1;
        }
    }

    Ok(failed)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Renumber {
            common,
            directories,
            start_index,
            season,
            dirs,
        } => {
            let request = RenumberRequest {
                dirs: dirs.clone(),
                directory_mode: *directories,
                start_index: *start_index,
                season_override: *season,
                filter: common.filter(),
                order: common.order(),
                prefix: common.prefix.clone(),
            };
            run_renumber(common, request).map(|failed| {
                if failed > 0 {
                    error!("{} director(ies) could not be processed", failed);
                    process::exit(1);
                }
            })
        }
        Commands::Unmangle {
            common,
            series,
            ignore_count_mismatch,
        } => run_unmangle(common, series, *ignore_count_mismatch),
        Commands::Multipart { common, series } => run_multipart(common, series),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
