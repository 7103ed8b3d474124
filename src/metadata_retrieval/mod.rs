//! Data structures and traits for episode metadata retrieval.
//!
//! This module provides the episode record shared by every ordering scheme,
//! as well as the trait implemented by episode catalog sources.
mod cached;
mod tvdb;
mod tvdb_types;

pub use cached::CachedEpisodeSource;
pub use tvdb::{SessionToken, TvdbProvider};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the provider's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The requested series was not found
    #[error("Series not found: {0}")]
    SeriesNotFound(u64),

    /// The provider rejected our credentials
    #[error("Authentication with the metadata provider failed: {0}")]
    Unauthorized(String),
}

/// Stable identifier of an episode, shared across ordering schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(pub u64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The episode orderings a catalog can be queried in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderingScheme {
    /// Original broadcast order, the target of every rename
    Aired,
    /// Order of the DVD releases
    Dvd,
    /// A single sequence across the whole series
    Absolute,
    /// Order used by streaming services
    Streaming,
}

impl OrderingScheme {
    /// Resolves the alternate ordering selected on the command line
    ///
    /// `absolute` takes precedence over `streaming`; with neither set the
    /// source is treated as DVD order.
    pub fn from_flags(absolute: bool, streaming: bool) -> Self {
        if absolute {
            OrderingScheme::Absolute
        } else if streaming {
            OrderingScheme::Streaming
        } else {
            OrderingScheme::Dvd
        }
    }

    /// The season type name understood by TheTVDB
    pub fn api_name(self) -> &'static str {
        match self {
            OrderingScheme::Aired => "official",
            OrderingScheme::Dvd => "dvd",
            OrderingScheme::Absolute => "absolute",
            OrderingScheme::Streaming => "streaming",
        }
    }

    /// Returns true for every ordering other than aired order
    pub fn is_alternate(self) -> bool {
        self != OrderingScheme::Aired
    }
}

impl fmt::Display for OrderingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// A single episode as reported by the catalog for one ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Identifier of the episode, identical across orderings
    pub id: EpisodeId,
    /// The episode title
    pub name: String,
    /// The episode number within the season
    pub episode_number: u32,
    /// The episode number across the whole series, if defined
    pub absolute_number: Option<u32>,
    /// The season number this episode belongs to (0 for specials)
    pub season_number: u32,
    /// Local file assigned during reconciliation
    #[serde(skip)]
    pub local_path: Option<PathBuf>,
}

impl EpisodeRecord {
    /// Creates a record without a local file
    pub fn new(
        id: u64,
        name: impl Into<String>,
        season_number: u32,
        episode_number: u32,
        absolute_number: Option<u32>,
    ) -> Self {
        Self {
            id: EpisodeId(id),
            name: name.into(),
            episode_number,
            absolute_number,
            season_number,
            local_path: None,
        }
    }

    /// Returns true if this record belongs to the specials season
    pub fn is_special(&self) -> bool {
        self.season_number == 0
    }
}

impl fmt::Display for EpisodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.absolute_number {
            Some(absolute) => write!(f, "{} | {:02} | ", self.id, absolute)?,
            None => write!(f, "{} | -- | ", self.id)?,
        }
        write!(
            f,
            "s{:02}e{:02} | {}",
            self.season_number, self.episode_number, self.name
        )
    }
}

/// Trait for catalogs that can list the episodes of a series.
///
/// Implementors return the episodes ordered per `ordering`, with specials
/// (season 0) already removed.
pub trait EpisodeSource {
    /// Lists the episodes of a series in the requested ordering.
    ///
    /// # Arguments
    ///
    /// * `series_id` - The catalog's identifier for the series
    /// * `ordering` - The ordering scheme to list the episodes in
    ///
    /// # Returns
    ///
    /// The ordered episodes, or a MetadataRetrievalError
    fn list_episodes(
        &self,
        series_id: u64,
        ordering: OrderingScheme,
    ) -> Result<Vec<EpisodeRecord>, MetadataRetrievalError>;
}

impl<S: EpisodeSource + ?Sized> EpisodeSource for &S {
    fn list_episodes(
        &self,
        series_id: u64,
        ordering: OrderingScheme,
    ) -> Result<Vec<EpisodeRecord>, MetadataRetrievalError> {
        (**self).list_episodes(series_id, ordering)
    }
}

impl<S: EpisodeSource + ?Sized> EpisodeSource for Box<S> {
    fn list_episodes(
        &self,
        series_id: u64,
        ordering: OrderingScheme,
    ) -> Result<Vec<EpisodeRecord>, MetadataRetrievalError> {
        (**self).list_episodes(series_id, ordering)
    }
}
