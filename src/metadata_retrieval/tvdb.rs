//! TheTVDB metadata provider implementation.
use super::tvdb_types::{TvdbEpisode, TvdbEpisodesPage, TvdbLoginRequest, TvdbLoginResponse};
use super::{EpisodeRecord, EpisodeSource, MetadataRetrievalError, OrderingScheme};
use crate::cache::CacheStorage;
use crate::config::Config;
use reqwest::StatusCode;
use reqwest::blocking::Response;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::debug;

/// Upper bound on the pages fetched for a single episode list
const MAX_PAGES: u32 = 200;

/// Bearer token issued by the login endpoint, as kept in the token cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
}

/// Metadata provider for the TheTVDB v4 API.
///
/// The provider logs in lazily on the first request. The session token can
/// be persisted through an injected cache so later invocations skip the login.
pub struct TvdbProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    pin: Option<String>,
    token: RefCell<Option<String>>,
    token_cache: Option<(CacheStorage<SessionToken>, String)>,
}

impl TvdbProvider {
    /// Creates a new TheTVDB provider from `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            pin: config.pin.clone(),
            token: RefCell::new(None),
            token_cache: None,
        }
    }

    /// Persists session tokens in `cache` under `key`
    pub fn with_token_cache(mut self, cache: CacheStorage<SessionToken>, key: impl Into<String>) -> Self {
        self.token_cache = Some((cache, key.into()));
        self
    }

    /// Returns the current session token, logging in if there is none.
    fn session_token(&self) -> Result<String, MetadataRetrievalError> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }

        if let Some((cache, key)) = &self.token_cache {
            if let Ok(Some(cached)) = cache.load(key) {
                debug!("loaded tvdb session token from '{}'", cache.cache_dir().display());
                *self.token.borrow_mut() = Some(cached.token.clone());
                return Ok(cached.token);
            }
        }

        let token = self.login()?;

        if let Some((cache, key)) = &self.token_cache {
            // Cache failures only cost us another login later
            let _ = cache.store(key, &SessionToken { token: token.clone() });
        }

        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    /// Drops the session token from memory and from the token cache.
    fn invalidate_token(&self) {
        self.token.borrow_mut().take();
        if let Some((cache, key)) = &self.token_cache {
            let _ = cache.remove(key);
        }
    }

    fn login(&self) -> Result<String, MetadataRetrievalError> {
        debug!("logging in to tvdb at {}", self.base_url);

        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&TvdbLoginRequest {
                apikey: &self.api_key,
                pin: self.pin.as_deref(),
            })
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(MetadataRetrievalError::Unauthorized(
                "the API key was rejected".to_string(),
            ));
        }

        let login: TvdbLoginResponse = Self::parse_success(response)?;
        Ok(login.data.token)
    }

    fn request_page(
        &self,
        url: &str,
        page: u32,
        token: &str,
    ) -> Result<Response, MetadataRetrievalError> {
        self.client
            .get(url)
            .bearer_auth(token)
            .query(&[("page", page)])
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))
    }

    /// Fetches one page of episodes, logging in again once if the token was rejected.
    fn fetch_page(
        &self,
        series_id: u64,
        url: &str,
        page: u32,
    ) -> Result<TvdbEpisodesPage, MetadataRetrievalError> {
        let mut response = self.request_page(url, page, &self.session_token()?)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("tvdb rejected the session token, logging in again");
            self.invalidate_token();
            response = self.request_page(url, page, &self.session_token()?)?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(MetadataRetrievalError::Unauthorized(
                    "a fresh session token was rejected".to_string(),
                ));
            }
        }

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MetadataRetrievalError::SeriesNotFound(series_id));
        }

        Self::parse_success(response)
    }

    fn parse_success<T>(response: Response) -> Result<T, MetadataRetrievalError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !response.status().is_success() {
            return Err(MetadataRetrievalError::RequestError(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json()
            .map_err(|e| MetadataRetrievalError::ParseError(e.to_string()))
    }

    /// Converts a TheTVDB episode to our internal EpisodeRecord.
    fn convert_episode(episode: TvdbEpisode) -> EpisodeRecord {
        EpisodeRecord::new(
            episode.id,
            episode.name.unwrap_or_else(|| "Unknown".to_string()),
            episode.season_number,
            episode.number,
            episode.absolute_number.filter(|n| *n > 0),
        )
    }

    /// Converts the collected pages into records, dropping specials.
    fn convert_episodes(episodes: Vec<TvdbEpisode>) -> Vec<EpisodeRecord> {
        episodes
            .into_iter()
            .filter(|e| e.season_number != 0)
            .map(Self::convert_episode)
            .collect()
    }
}

impl EpisodeSource for TvdbProvider {
    fn list_episodes(
        &self,
        series_id: u64,
        ordering: OrderingScheme,
    ) -> Result<Vec<EpisodeRecord>, MetadataRetrievalError> {
        let url = format!(
            "{}/series/{}/episodes/{}",
            self.base_url,
            series_id,
            ordering.api_name()
        );

        let mut episodes = Vec::new();
        let mut page = 0;

        loop {
            let response = self.fetch_page(series_id, &url, page)?;
            let exhausted = response.data.episodes.is_empty();
            episodes.extend(response.data.episodes);

            match response.links.and_then(|l| l.next) {
                Some(_) if !exhausted => page += 1,
                _ => break,
            }

            if page >= MAX_PAGES {
                return Err(MetadataRetrievalError::RequestError(format!(
                    "tvdb returned more than {} pages for series {}",
                    MAX_PAGES, series_id
                )));
            }
        }

        debug!(
            "fetched {} {} episodes for series {}",
            episodes.len(),
            ordering,
            series_id
        );

        Ok(Self::convert_episodes(episodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// A request as seen by the local test server
    struct ServedRequest {
        line: String,
        token: Option<String>,
    }

    impl ServedRequest {
        fn is_login(&self) -> bool {
            self.line.starts_with("POST /login")
        }

        fn page(&self) -> Option<u32> {
            let (_, rest) = self.line.split_once("page=")?;
            rest.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
        }
    }

    /// Answers every connection on a local port with `handler`
    ///
    /// Returns the base URL of the server.
    fn serve<F>(handler: F) -> String
    where
        F: Fn(&ServedRequest) -> (u16, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut line = String::new();
                reader.read_line(&mut line).unwrap();

                let mut token = None;
                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap() == 0 || header.trim().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        let value = value.trim();
                        match name.to_ascii_lowercase().as_str() {
                            "content-length" => content_length = value.parse().unwrap(),
                            "authorization" => {
                                token = value.strip_prefix("Bearer ").map(str::to_string)
                            }
                            _ => {}
                        }
                    }
                }
                let mut body = vec![0; content_length];
                reader.read_exact(&mut body).unwrap();

                let request = ServedRequest {
                    line: line.trim().to_string(),
                    token,
                };
                let (status, body) = handler(&request);
                write!(
                    stream,
                    "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
            }
        });

        format!("http://{}", addr)
    }

    fn provider(base_url: String) -> TvdbProvider {
        let mut provider = TvdbProvider::new(&Config {
            api_key: "key".to_string(),
            pin: None,
            base_url,
        });
        provider.client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .unwrap();
        provider
    }

    fn login_body(token: &str) -> String {
        format!(r#"{{"data":{{"token":"{}"}}}}"#, token)
    }

    fn episodes_body(ids: &[u64], has_next: bool) -> String {
        let episodes: Vec<String> = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"id":{id},"name":"Episode {id}","number":{id},"absoluteNumber":{id},"seasonNumber":1}}"#
                )
            })
            .collect();
        let next = if has_next { r#""next""# } else { "null" };
        format!(
            r#"{{"data":{{"episodes":[{}]}},"links":{{"next":{}}}}}"#,
            episodes.join(","),
            next
        )
    }

    fn ids(episodes: &[EpisodeRecord]) -> Vec<u64> {
        episodes.iter().map(|e| e.id.0).collect()
    }

    #[test]
    fn test_follows_next_links_across_pages() {
        let base_url = serve(|request| {
            if request.is_login() {
                return (200, login_body("t1"));
            }
            match request.page() {
                Some(0) => (200, episodes_body(&[1, 2], true)),
                Some(1) => (200, episodes_body(&[3], false)),
                _ => (500, "{}".to_string()),
            }
        });

        let episodes = provider(base_url)
            .list_episodes(7, OrderingScheme::Dvd)
            .unwrap();
        assert_eq!(ids(&episodes), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejected_token_triggers_one_login() {
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&logins);
        let base_url = serve(move |request| {
            if request.is_login() {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                return (200, login_body(&format!("t{}", n)));
            }
            match request.token.as_deref() {
                Some("t2") => (200, episodes_body(&[1], false)),
                _ => (401, "{}".to_string()),
            }
        });

        let episodes = provider(base_url)
            .list_episodes(7, OrderingScheme::Aired)
            .unwrap();
        assert_eq!(ids(&episodes), vec![1]);
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_rejection_is_unauthorized() {
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&logins);
        let base_url = serve(move |request| {
            if request.is_login() {
                counter.fetch_add(1, Ordering::SeqCst);
                return (200, login_body("t"));
            }
            (401, "{}".to_string())
        });

        let result = provider(base_url).list_episodes(7, OrderingScheme::Aired);
        assert!(matches!(result, Err(MetadataRetrievalError::Unauthorized(_))));
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_series_is_not_found() {
        let base_url = serve(|request| {
            if request.is_login() {
                (200, login_body("t"))
            } else {
                (404, "{}".to_string())
            }
        });

        let result = provider(base_url).list_episodes(7, OrderingScheme::Dvd);
        assert!(matches!(result, Err(MetadataRetrievalError::SeriesNotFound(7))));
    }

    #[test]
    fn test_empty_page_ends_paging() {
        let pages = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pages);
        let base_url = serve(move |request| {
            if request.is_login() {
                return (200, login_body("t"));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            match request.page() {
                Some(0) => (200, episodes_body(&[1], true)),
                _ => (200, episodes_body(&[], true)),
            }
        });

        let episodes = provider(base_url)
            .list_episodes(7, OrderingScheme::Dvd)
            .unwrap();
        assert_eq!(ids(&episodes), vec![1]);
        assert_eq!(pages.load(Ordering::SeqCst), 2);
    }

    const PAGE: &str = r#"{
        "status": "success",
        "data": {
            "series": { "id": 81189, "name": "Example Show" },
            "episodes": [
                { "id": 10, "name": "Unaired Pilot", "number": 1, "absoluteNumber": 0, "seasonNumber": 0 },
                { "id": 11, "name": "Pilot", "number": 1, "absoluteNumber": 1, "seasonNumber": 1 },
                { "id": 12, "name": null, "number": 2, "absoluteNumber": null, "seasonNumber": 1 }
            ]
        },
        "links": { "prev": null, "self": "https://example/page=0", "next": null, "total_items": 3, "page_size": 500 }
    }"#;

    #[test]
    fn test_parse_episode_page() {
        let page: TvdbEpisodesPage = serde_json::from_str(PAGE).unwrap();
        assert!(page.links.unwrap().next.is_none());

        let episodes = TvdbProvider::convert_episodes(page.data.episodes);
        assert_eq!(
            episodes,
            vec![
                EpisodeRecord::new(11, "Pilot", 1, 1, Some(1)),
                EpisodeRecord::new(12, "Unknown", 1, 2, None),
            ]
        );
    }

    #[test]
    fn test_missing_required_field_fails() {
        let page = r#"{ "data": { "episodes": [ { "id": 11, "name": "Pilot", "number": 1 } ] } }"#;
        assert!(serde_json::from_str::<TvdbEpisodesPage>(page).is_err());
    }

    #[test]
    fn test_login_request_omits_missing_pin() {
        let body = serde_json::to_string(&TvdbLoginRequest {
            apikey: "key",
            pin: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"apikey":"key"}"#);
    }
}
