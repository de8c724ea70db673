use std::cell::RefCell;
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use super::wire::{
    FeaturesResponse, NewReleasesResponse, PlaylistEntry, PlaylistObject, RawRelease, RawTrack,
    SearchResponse, TokenResponse, WirePage,
};
use super::{ApiError, ApiResult, CatalogApi, Page, PLAYLIST_PAGE_SIZE};
use crate::config::CatalogConfig;
use crate::models::FeatureVector;

/// Re-fetch the token this long before it expires.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// Linear back-off step between transport-level retries.
const RETRY_STEP_MS: u64 = 500;

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Client credentials for the token endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

struct Token {
    value: String,
    expires_at: Instant,
}

/// Catalog API over HTTPS.
pub struct WebCatalog {
    agent: ureq::Agent,
    config: CatalogConfig,
    credentials: Credentials,
    token: RefCell<Option<Token>>,
}

impl WebCatalog {
    pub fn new(config: CatalogConfig, credentials: Credentials) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            config,
            credentials,
            token: RefCell::new(None),
        }
    }

    fn bearer(&self) -> ApiResult<String> {
        if let Some(t) = self.token.borrow().as_ref() {
            if Instant::now() + TOKEN_MARGIN < t.expires_at {
                return Ok(t.value.clone());
            }
        }

        log::debug!("Requesting access token from {}", self.config.token_url);
        let mut http_resp = self
            .agent
            .post(&self.config.token_url)
            .send_form([
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .map_err(|e| ApiError::auth(format!("token request failed: {e}")))?;
        if !http_resp.status().is_success() {
            return Err(ApiError::auth(format!("token request failed: HTTP {}", http_resp.status().as_u16())));
        }
        let resp: TokenResponse = http_resp
            .body_mut()
            .read_json()
            .map_err(|e| ApiError::auth(format!("token response unreadable: {e}")))?;

        let value = resp.access_token.clone();
        *self.token.borrow_mut() = Some(Token {
            value: resp.access_token,
            expires_at: Instant::now() + Duration::from_secs(resp.expires_in),
        });
        Ok(value)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// GET `url` with query pairs, retrying 401/429/5xx/transport failures.
    /// Waits for `Retry-After` when the server sends it, otherwise backs off
    /// linearly.
    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let mut attempt: u32 = 0;
        loop {
            let token = self.bearer()?;
            let mut req = self
                .agent
                .get(url)
                .header("Authorization", format!("Bearer {token}"));
            for (k, v) in query {
                req = req.query(*k, v);
            }

            let mut retry_after = None;
            let err = match req.call() {
                Ok(mut resp) if resp.status().is_success() => {
                    return resp
                        .body_mut()
                        .read_json::<T>()
                        .map_err(|e| ApiError::decode(format!("{url}: {e}")));
                }
                Ok(resp) => {
                    let code = resp.status().as_u16();
                    if code == 401 {
                        // Token revoked or expired early; drop it and let the retry re-auth.
                        self.token.borrow_mut().take();
                    }
                    retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after);
                    ApiError::status(code, url.to_string())
                }
                Err(e) => ApiError::transport(format!("{url}: {e}")),
            };

            let retryable = match err.status {
                Some(401) | Some(429) => true,
                Some(code) => code >= 500,
                None => true,
            };
            if !retryable || attempt >= self.config.retries {
                return Err(err);
            }
            attempt += 1;
            let wait = retry_after.unwrap_or(Duration::from_millis(RETRY_STEP_MS * attempt as u64));
            log::debug!(
                "Retrying ({attempt}/{}) in {}ms after: {err}",
                self.config.retries,
                wait.as_millis()
            );
            thread::sleep(wait);
        }
    }

    fn market(&self) -> (&'static str, String) {
        ("market", self.config.market.clone())
    }
}

/// Delay from a `Retry-After` value in whole seconds, capped at
/// [`MAX_RETRY_AFTER`]. HTTP-date values are not supported.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

impl CatalogApi for WebCatalog {
    fn playlist_items(&self, playlist_id: &str, cursor: Option<&str>) -> ApiResult<Page<PlaylistEntry>> {
        let page: WirePage<PlaylistEntry> = match cursor {
            Some(next) => self.get_json(next, &[])?,
            None => self.get_json(
                &self.endpoint(&format!("playlists/{playlist_id}/tracks")),
                &[
                    ("limit", PLAYLIST_PAGE_SIZE.to_string()),
                    ("offset", "0".to_string()),
                    ("additional_types", "track".to_string()),
                    self.market(),
                ],
            )?,
        };
        Ok(page.into())
    }

    fn playlist(&self, playlist_id: &str) -> ApiResult<Page<PlaylistEntry>> {
        let obj: PlaylistObject = self.get_json(
            &self.endpoint(&format!("playlists/{playlist_id}")),
            &[self.market()],
        )?;
        Ok(obj.tracks.map(Page::from).unwrap_or_else(Page::empty))
    }

    fn follow_playlist_cursor(&self, cursor: &str) -> ApiResult<Page<PlaylistEntry>> {
        let page: WirePage<PlaylistEntry> = self.get_json(cursor, &[])?;
        Ok(page.into())
    }

    fn search_tracks(&self, query: &str, offset: usize, page_size: usize) -> ApiResult<Page<RawTrack>> {
        let resp: SearchResponse = self.get_json(
            &self.endpoint("search"),
            &[
                ("q", query.to_string()),
                ("type", "track".to_string()),
                ("limit", page_size.to_string()),
                ("offset", offset.to_string()),
                self.market(),
            ],
        )?;
        Ok(resp.tracks.map(Page::from).unwrap_or_else(Page::empty))
    }

    fn new_releases(&self, offset: usize, page_size: usize) -> ApiResult<Page<RawRelease>> {
        let resp: NewReleasesResponse = self.get_json(
            &self.endpoint("browse/new-releases"),
            &[("limit", page_size.to_string()), ("offset", offset.to_string())],
        )?;
        Ok(resp.albums.map(Page::from).unwrap_or_else(Page::empty))
    }

    fn release_tracks(&self, release_id: &str, page_size: usize) -> ApiResult<Page<RawTrack>> {
        let page: WirePage<RawTrack> = self.get_json(
            &self.endpoint(&format!("albums/{release_id}/tracks")),
            &[("limit", page_size.to_string()), self.market()],
        )?;
        Ok(page.into())
    }

    fn track(&self, track_id: &str) -> ApiResult<RawTrack> {
        self.get_json(&self.endpoint(&format!("tracks/{track_id}")), &[self.market()])
    }

    fn audio_features(&self, track_ids: &[String]) -> ApiResult<Vec<Option<FeatureVector>>> {
        let resp: FeaturesResponse = self.get_json(
            &self.endpoint("audio-features"),
            &[("ids", track_ids.join(","))],
        )?;
        Ok(resp.audio_features)
    }
}
