//! TheTVDB v4 API response types for deserialization.
//!
//! These structures mirror the JSON response format from the TheTVDB API.
use serde::{Deserialize, Serialize};

/// Request body of the login endpoint
#[derive(Debug, Serialize)]
pub(super) struct TvdbLoginRequest<'a> {
    pub apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<&'a str>,
}

/// Response of the login endpoint
#[derive(Debug, Deserialize)]
pub(super) struct TvdbLoginResponse {
    pub data: TvdbLoginData,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvdbLoginData {
    pub token: String,
}

/// One page of the series episodes endpoint
#[derive(Debug, Deserialize)]
pub(super) struct TvdbEpisodesPage {
    pub data: TvdbEpisodesData,
    /// Paging links; absent on some error-free single page responses
    #[serde(default)]
    pub links: Option<TvdbLinks>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvdbEpisodesData {
    #[serde(default)]
    pub episodes: Vec<TvdbEpisode>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvdbLinks {
    /// URL of the next page, null on the last page
    pub next: Option<String>,
}

/// A single episode from the TheTVDB API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TvdbEpisode {
    pub id: u64,
    /// Episode title (may be null for episodes without a title)
    pub name: Option<String>,
    /// Episode number within the season
    pub number: u32,
    /// Series-wide number; null or 0 when undefined
    #[serde(default)]
    pub absolute_number: Option<u32>,
    /// Season number (0 for specials)
    pub season_number: u32,
}
