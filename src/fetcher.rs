//! Pages through the image archive API collecting candidate URLs.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::constants::{RESOLUTION_TOKEN, UHD_TOKEN};
use crate::error::WallfetchError;
use crate::history::is_absolute_url;
use crate::transport::Transport;

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    #[serde(default)]
    images: Vec<ImageRecord>,
}

/// One entry of the API's `images` array.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ImageRecord {
    /// URL fragment, usually relative to the API origin
    #[serde(default)]
    pub url: String,
    /// Display title, when the API sends one
    #[serde(default)]
    pub title: Option<String>,
}

/// One page of results. `done` is set once the API has nothing more to give.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// Records on this page
    pub records: Vec<ImageRecord>,
    /// No further pages are worth requesting
    pub done: bool,
}

/// Builds the absolute, high-resolution URL for a record's fragment.
pub fn candidate_url(origin: &str, fragment: &str) -> Option<String> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return None;
    }
    let upgraded = fragment.replace(RESOLUTION_TOKEN, UHD_TOKEN);
    if is_absolute_url(&upgraded) {
        return Some(upgraded);
    }
    let origin = Url::parse(origin).ok()?;
    origin.join(&upgraded).ok().map(String::from)
}

/// Paginated client for the metadata API.
pub struct MetadataFetcher<T> {
    transport: T,
    endpoint: String,
    origin: String,
    market: String,
    page_size: u32,
    target: usize,
    max_idx: u32,
    page_delay: Duration,
}

impl<T: Transport> MetadataFetcher<T> {
    /// Takes the endpoint, paging limits and delay from `config`.
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            endpoint: config.api_endpoint.clone(),
            origin: config.api_origin.clone(),
            market: config.market.clone(),
            page_size: config.page_size.max(1),
            target: config.target_candidates,
            max_idx: config.max_idx,
            page_delay: config.page_delay,
        }
    }

    /// Requests the page starting `idx` days back.
    pub fn fetch_page(&self, idx: u32) -> Result<Page, WallfetchError> {
        let query = [
            ("format", "js".to_string()),
            ("idx", idx.to_string()),
            ("n", self.page_size.to_string()),
            ("mkt", self.market.clone()),
        ];
        let bytes = self.transport.get(&self.endpoint, &query)?;
        let response: ArchiveResponse = serde_json::from_slice(&bytes)
            .map_err(|err| WallfetchError::Decode(format!("metadata response: {err}")))?;
        let done = response.images.is_empty();
        Ok(Page {
            records: response.images,
            done,
        })
    }

    /// Collects up to the target number of URLs that aren't in `exclude`.
    ///
    /// A failed page ends the walk early; whatever was gathered before it is
    /// still returned.
    pub fn fetch_candidates(&self, exclude: &HashSet<String>) -> Vec<String> {
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        let mut idx = 0;

        while idx < self.max_idx && candidates.len() < self.target {
            if idx > 0 {
                std::thread::sleep(self.page_delay);
            }
            let page = match self.fetch_page(idx) {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        "Metadata page idx={} failed, keeping {} candidates: {}",
                        idx,
                        candidates.len(),
                        err
                    );
                    break;
                }
            };
            if page.done {
                debug!("Metadata API ran dry at idx={}", idx);
                break;
            }

            let returned = page.records.len();
            for record in page.records {
                let Some(url) = candidate_url(&self.origin, &record.url) else {
                    debug!("Skipping record without a usable url: {:?}", record);
                    continue;
                };
                if exclude.contains(&url) || !seen.insert(url.clone()) {
                    continue;
                }
                debug!(
                    "New candidate {} ({})",
                    url,
                    record.title.as_deref().unwrap_or("untitled")
                );
                candidates.push(url);
                if candidates.len() >= self.target {
                    break;
                }
            }
            debug!(
                "Page idx={} gave {} records, {} candidates so far",
                idx,
                returned,
                candidates.len()
            );
            idx = idx.saturating_add(u32::try_from(returned).unwrap_or(u32::MAX));
        }

        info!("Fetched {} new candidates", candidates.len());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::json;
    use std::cell::RefCell;

    const ORIGIN: &str = "https://www.bing.com";

    /// Serves one scripted page per call, keyed by `idx`.
    struct ScriptedApi {
        pages: Vec<(u32, Result<Vec<&'static str>, TransportError>)>,
        requested: RefCell<Vec<u32>>,
    }

    impl ScriptedApi {
        fn new(pages: Vec<(u32, Result<Vec<&'static str>, TransportError>)>) -> Self {
            Self {
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedApi {
        fn get(&self, _url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
            let idx: u32 = query
                .iter()
                .find(|(key, _)| *key == "idx")
                .and_then(|(_, value)| value.parse().ok())
                .expect("idx param");
            assert!(query.contains(&("format", "js".to_string())));
            self.requested.borrow_mut().push(idx);
            let urls = match self.pages.iter().find(|(page_idx, _)| *page_idx == idx) {
                Some((_, Ok(urls))) => urls.clone(),
                Some((_, Err(err))) => return Err(err.clone()),
                None => Vec::new(),
            };
            let images: Vec<_> = urls.iter().map(|url| json!({ "url": url })).collect();
            Ok(serde_json::to_vec(&json!({ "images": images })).expect("serialize"))
        }
    }

    fn config(target: usize) -> Config {
        Config {
            target_candidates: target,
            page_delay: Duration::ZERO,
            ..Config::default()
        }
    }

    #[test]
    fn upgrades_resolution_and_prefixes_origin() {
        assert_eq!(
            candidate_url(ORIGIN, "/th?id=OHR.Fox_1920x1080.jpg&pid=hp").as_deref(),
            Some("https://www.bing.com/th?id=OHR.Fox_UHD.jpg&pid=hp")
        );
        assert_eq!(
            candidate_url(ORIGIN, "https://cdn.example.org/a_1920x1080.jpg").as_deref(),
            Some("https://cdn.example.org/a_UHD.jpg")
        );
        assert_eq!(candidate_url(ORIGIN, "  "), None);
    }

    #[test]
    fn pages_until_the_api_runs_dry() {
        let api = ScriptedApi::new(vec![
            (0, Ok(vec!["/a_1920x1080.jpg", "/b_1920x1080.jpg"])),
            (2, Ok(vec!["/c_1920x1080.jpg"])),
        ]);
        let fetcher = MetadataFetcher::new(&api, &config(200));
        let urls = fetcher.fetch_candidates(&HashSet::new());
        assert_eq!(
            urls,
            vec![
                "https://www.bing.com/a_UHD.jpg",
                "https://www.bing.com/b_UHD.jpg",
                "https://www.bing.com/c_UHD.jpg",
            ]
        );
        assert_eq!(*api.requested.borrow(), vec![0, 2, 3]);
    }

    #[test]
    fn skips_history_and_duplicates() {
        let api = ScriptedApi::new(vec![
            (0, Ok(vec!["/a.jpg", "/b.jpg", "/a.jpg"])),
            (3, Ok(vec!["/b.jpg", "/c.jpg"])),
        ]);
        let exclude: HashSet<String> = ["https://www.bing.com/b.jpg".to_string()].into();
        let urls = MetadataFetcher::new(&api, &config(200)).fetch_candidates(&exclude);
        assert_eq!(
            urls,
            vec!["https://www.bing.com/a.jpg", "https://www.bing.com/c.jpg"]
        );
    }

    #[test]
    fn stops_at_target() {
        let api = ScriptedApi::new(vec![
            (0, Ok(vec!["/a.jpg", "/b.jpg", "/c.jpg"])),
            (3, Ok(vec!["/d.jpg"])),
        ]);
        let urls = MetadataFetcher::new(&api, &config(2)).fetch_candidates(&HashSet::new());
        assert_eq!(urls.len(), 2);
        assert_eq!(*api.requested.borrow(), vec![0]);
    }

    #[test]
    fn failure_keeps_partial_results() {
        let api = ScriptedApi::new(vec![
            (0, Ok(vec!["/a.jpg"])),
            (1, Err(TransportError::Status(503))),
            (2, Ok(vec!["/never.jpg"])),
        ]);
        let urls = MetadataFetcher::new(&api, &config(200)).fetch_candidates(&HashSet::new());
        assert_eq!(urls, vec!["https://www.bing.com/a.jpg"]);
        assert_eq!(*api.requested.borrow(), vec![0, 1]);
    }

    #[test]
    fn idx_is_bounded() {
        let pages = (0..10)
            .map(|idx| (idx, Ok(vec!["/same.jpg"])))
            .collect::<Vec<_>>();
        let api = ScriptedApi::new(pages);
        let fetcher = MetadataFetcher::new(
            &api,
            &Config {
                max_idx: 4,
                ..config(200)
            },
        );
        let urls = fetcher.fetch_candidates(&HashSet::new());
        assert_eq!(urls, vec!["https://www.bing.com/same.jpg"]);
        assert_eq!(*api.requested.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn page_records_keep_their_titles() {
        struct Titled;
        impl Transport for Titled {
            fn get(&self, _: &str, _: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
                let body = json!({ "images": [
                    { "url": "/a.jpg", "title": "Fox in the snow" },
                    { "url": "/b.jpg" },
                ]});
                Ok(serde_json::to_vec(&body).expect("serialize"))
            }
        }
        let page = MetadataFetcher::new(Titled, &config(200))
            .fetch_page(0)
            .expect("page");
        assert!(!page.done);
        let titles: Vec<_> = page.records.iter().map(|r| r.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Fox in the snow"), None]);
    }

    #[test]
    fn garbage_response_is_an_error_page() {
        struct Garbage;
        impl Transport for Garbage {
            fn get(&self, _: &str, _: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
                Ok(b"<html>nope</html>".to_vec())
            }
        }
        let fetcher = MetadataFetcher::new(Garbage, &config(200));
        assert!(matches!(fetcher.fetch_page(0), Err(WallfetchError::Decode(_))));
        assert!(fetcher.fetch_candidates(&HashSet::new()).is_empty());
    }
}
