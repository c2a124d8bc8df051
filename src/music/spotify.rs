//! Spotify track links resolved to a search string, since the audio itself
//! comes from yt-dlp.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::source::HTTP;
use crate::config::SpotifyCredentials;
use crate::error::SourceError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TRACKS_URL: &str = "https://api.spotify.com/v1/tracks";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

/// Track id from `https://open.spotify.com/track/<id>` (locale segments
/// such as `/intl-de/` allowed) or `spotify:track:<id>`.
pub fn track_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(id) = input.strip_prefix("spotify:track:") {
        return Some(id.to_string()).filter(|id| !id.is_empty());
    }
    let parsed = url::Url::parse(input).ok()?;
    if parsed.host_str() != Some("open.spotify.com") {
        return None;
    }
    let mut segments = parsed.path_segments()?;
    segments
        .by_ref()
        .find(|s| *s == "track")
        .and_then(|_| segments.next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

pub struct SpotifyResolver {
    credentials: SpotifyCredentials,
    token: Mutex<Option<(String, Instant)>>,
}

impl SpotifyResolver {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self {
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires)) = cached.as_ref()
            && Instant::now() < *expires
        {
            return Ok(token.clone());
        }

        let resp: TokenResponse = HTTP
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Refresh a minute early.
        let ttl = Duration::from_secs(resp.expires_in.saturating_sub(60));
        *cached = Some((resp.access_token.clone(), Instant::now() + ttl));
        Ok(resp.access_token)
    }

    /// `"Artist, Artist - Title"` for a track id.
    pub async fn search_query(&self, id: &str) -> Result<String, SourceError> {
        let token = self.access_token().await?;
        let track: Track = HTTP
            .get(format!("{TRACKS_URL}/{id}"))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SourceError::Lookup(e.to_string()))?
            .json()
            .await?;
        let artists = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        debug!("spotify track {id} -> {artists} - {}", track.name);
        if artists.is_empty() {
            Ok(track.name)
        } else {
            Ok(format!("{artists} - {}", track.name))
        }
    }
}
