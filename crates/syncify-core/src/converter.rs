//! Song conversion
//!
//! Matches a source song to a destination catalog track. Searches go from
//! the most specific query to the loosest one:
//!
//! 1. `<title> <all artists>`
//! 2. `<title> <first artist>`
//! 3. `<title>`
//!
//! The first ranked result of the first query that returns anything wins.
//! Each query runs through the search [`RetryPolicy`].
//!
//! ## Usage
//!
//! ```ignore
//! let converter = SongConverter::new(&tidal, RetryPolicy::search(), config.pacing());
//! let results = converter
//!     .convert_all(&songs, |i, total, song| println!("{}/{} {}", i + 1, total, song.title))
//!     .await;
//! ```

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, DestinationCatalog};
use crate::error::ErrorKind;
use crate::models::{DestinationSong, SourceSong};
use crate::retry::RetryPolicy;

/// Why a song could not be converted
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Missing title or artists")]
    Invalid,

    #[error("No match found on Tidal for '{title}' by {artists}")]
    NoMatch { title: String, artists: String },

    /// Search failed in a way that affects every song (e.g. rejected token)
    #[error("Search failed: {0}")]
    Search(CatalogError),
}

impl ConversionError {
    /// Whether the remaining songs cannot succeed either
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConversionError::Search(e) if e.kind() == ErrorKind::Auth)
    }
}

/// Outcome of converting one song
#[derive(Debug)]
pub struct ConversionResult {
    pub source: SourceSong,
    pub result: Result<DestinationSong, ConversionError>,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Keep word characters, whitespace, `'` and `-`; collapse whitespace
pub fn sanitize_query(query: &str) -> String {
    let replaced: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '\'' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Search queries for a song, most specific first
pub fn search_strategies(song: &SourceSong) -> Vec<String> {
    let first_artist = song.artists.first().map(String::as_str).unwrap_or_default();
    vec![
        format!("{} {}", song.title, song.artists.join(" ")),
        format!("{} {}", song.title, first_artist),
        song.title.clone(),
    ]
    .iter()
    .map(|q| sanitize_query(q))
    .collect()
}

/// Converts source songs into destination songs
pub struct SongConverter<'a> {
    catalog: &'a dyn DestinationCatalog,
    policy: RetryPolicy,
    pacing: Duration,
}

impl<'a> SongConverter<'a> {
    pub fn new(catalog: &'a dyn DestinationCatalog, policy: RetryPolicy, pacing: Duration) -> Self {
        Self {
            catalog,
            policy,
            pacing,
        }
    }

    /// Convert one song
    pub async fn convert(&self, song: &SourceSong) -> ConversionResult {
        let result = self.find_match(song).await;
        ConversionResult {
            source: song.clone(),
            result,
        }
    }

    async fn find_match(&self, song: &SourceSong) -> Result<DestinationSong, ConversionError> {
        if song.title.trim().is_empty() || song.artists.is_empty() {
            return Err(ConversionError::Invalid);
        }

        let catalog = self.catalog;
        for (index, query) in search_strategies(song).iter().enumerate() {
            let q = query.as_str();
            let context = format!("Searching Tidal for '{}'", q);

            match self.policy.run(&context, move || catalog.search_track(q)).await {
                Ok(Some(hit)) => {
                    if index > 0 {
                        warn!(
                            "Found match using fallback strategy {} for '{}' by {}",
                            index + 1,
                            song.title,
                            song.artists.join(", ")
                        );
                    }
                    return Ok(DestinationSong::new(
                        hit.title,
                        hit.artists.join(", "),
                        hit.id,
                        song.source_id.clone(),
                    ));
                }
                Ok(None) => debug!("No results for '{}'", q),
                Err(e) if e.kind() == ErrorKind::Auth => {
                    return Err(ConversionError::Search(e));
                }
                Err(e) => debug!("Search strategy {} failed: {}", index + 1, e),
            }
        }

        Err(ConversionError::NoMatch {
            title: song.title.clone(),
            artists: song.artists.join(", "),
        })
    }

    /// Convert songs one after another
    ///
    /// `on_progress(index, total, song)` is called before each conversion.
    /// Stops early after a failure that every later song would hit too.
    pub async fn convert_all<F>(&self, songs: &[SourceSong], mut on_progress: F) -> Vec<ConversionResult>
    where
        F: FnMut(usize, usize, &SourceSong),
    {
        let total = songs.len();
        let mut results = Vec::with_capacity(total);

        for (index, song) in songs.iter().enumerate() {
            on_progress(index, total, song);

            let result = self.convert(song).await;
            let fatal = matches!(&result.result, Err(e) if e.is_fatal());
            results.push(result);
            if fatal {
                break;
            }

            if index + 1 < total && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogResult, TrackMatch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Destination catalog that answers searches from a fixed table
    struct SearchOnly {
        hits: Vec<(&'static str, TrackMatch)>,
        fail_with: Option<fn() -> CatalogError>,
        queries: Mutex<Vec<String>>,
    }

    impl SearchOnly {
        fn new(hits: Vec<(&'static str, TrackMatch)>) -> Self {
            Self {
                hits,
                fail_with: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DestinationCatalog for SearchOnly {
        async fn search_track(&self, query: &str) -> CatalogResult<Option<TrackMatch>> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(self
                .hits
                .iter()
                .find(|(q, _)| *q == query)
                .map(|(_, hit)| hit.clone()))
        }

        async fn track_exists(&self, _track_id: &str) -> CatalogResult<bool> {
            Ok(true)
        }

        async fn create_playlist(&self, _name: &str, _description: &str) -> CatalogResult<String> {
            unimplemented!()
        }

        async fn playlist_etag(&self, _playlist_id: &str) -> CatalogResult<String> {
            unimplemented!()
        }

        async fn playlist_items(&self, _playlist_id: &str) -> CatalogResult<Vec<String>> {
            unimplemented!()
        }

        async fn add_track(&self, _p: &str, _t: &str, _e: &str) -> CatalogResult<Option<String>> {
            unimplemented!()
        }

        async fn remove_item(&self, _p: &str, _i: usize, _e: &str) -> CatalogResult<Option<String>> {
            unimplemented!()
        }
    }

    fn hit(id: &str, title: &str, artists: &[&str]) -> TrackMatch {
        TrackMatch {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn song(title: &str, artists: &[&str]) -> SourceSong {
        SourceSong::new(title, artists.iter().map(|a| a.to_string()).collect(), "sp-1")
    }

    fn converter(catalog: &dyn DestinationCatalog) -> SongConverter<'_> {
        let policy = RetryPolicy::search().with_delays(Duration::ZERO, Duration::ZERO);
        SongConverter::new(catalog, policy, Duration::ZERO)
    }

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("Hello, World! (Remix)"), "Hello World Remix");
        assert_eq!(sanitize_query("  Don't   Stop-Me  "), "Don't Stop-Me");
        assert_eq!(sanitize_query("Beyoncé & Jay-Z"), "Beyoncé Jay-Z");
    }

    #[test]
    fn test_search_strategies_order() {
        let s = song("Song", &["X", "Y"]);
        assert_eq!(search_strategies(&s), vec!["Song X Y", "Song X", "Song"]);
    }

    #[tokio::test]
    async fn test_first_strategy_match() {
        let catalog = SearchOnly::new(vec![("Song X Y", hit("42", "Song", &["X", "Y"]))]);
        let result = converter(&catalog).convert(&song("Song", &["X", "Y"])).await;

        let converted = result.result.unwrap();
        assert_eq!(converted.destination_id, "42");
        assert_eq!(converted.artist, "X, Y");
        assert_eq!(converted.source_id, "sp-1");
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_to_title_only() {
        let catalog = SearchOnly::new(vec![("Song", hit("7", "Song", &["Z"]))]);
        let result = converter(&catalog).convert(&song("Song", &["X", "Y"])).await;

        assert_eq!(result.result.unwrap().destination_id, "7");
        assert_eq!(catalog.queries(), vec!["Song X Y", "Song X", "Song"]);
    }

    #[tokio::test]
    async fn test_all_strategies_fail() {
        let catalog = SearchOnly::new(vec![]);
        let result = converter(&catalog).convert(&song("Song", &["X", "Y"])).await;

        assert!(!result.is_success());
        let err = result.result.unwrap_err();
        assert_eq!(err.to_string(), "No match found on Tidal for 'Song' by X, Y");
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_each_strategy() {
        let mut catalog = SearchOnly::new(vec![]);
        catalog.fail_with = Some(|| CatalogError::RateLimited);

        let result = converter(&catalog).convert(&song("Song", &["X"])).await;

        assert!(matches!(result.result, Err(ConversionError::NoMatch { .. })));
        // 3 strategies, 2 attempts each
        assert_eq!(catalog.queries().len(), 6);
    }

    #[tokio::test]
    async fn test_invalid_song_is_not_searched() {
        let catalog = SearchOnly::new(vec![]);
        let c = converter(&catalog);

        let result = c.convert(&song("", &["X"])).await;
        assert!(matches!(result.result, Err(ConversionError::Invalid)));

        let result = c.convert(&song("Song", &[])).await;
        assert_eq!(result.result.unwrap_err().to_string(), "Missing title or artists");

        assert!(catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn test_convert_all_stops_on_auth_failure() {
        let mut catalog = SearchOnly::new(vec![]);
        catalog.fail_with = Some(|| CatalogError::Auth("401".into()));

        let songs = vec![song("A", &["X"]), song("B", &["X"])];
        let mut seen = Vec::new();
        let results = converter(&catalog)
            .convert_all(&songs, |i, total, s| seen.push((i, total, s.title.clone())))
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].result.as_ref().unwrap_err().is_fatal());
        assert_eq!(seen, vec![(0, 2, "A".to_string())]);
    }

    #[tokio::test]
    async fn test_convert_all_reports_progress_in_order() {
        let catalog = SearchOnly::new(vec![
            ("A X", hit("1", "A", &["X"])),
            ("B X", hit("2", "B", &["X"])),
        ]);
        let songs = vec![song("A", &["X"]), song("B", &["X"])];
        let mut seen = Vec::new();

        let results = converter(&catalog)
            .convert_all(&songs, |i, total, _| seen.push((i, total)))
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(ConversionResult::is_success));
        assert_eq!(seen, vec![(0, 2), (1, 2)]);
    }
}
