/*
 *  wiim.rs
 *
 *  WiiMon - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use serde::Deserialize;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::constants::UNKNOWN_ARTIST;
use crate::transport::HttpFetch;

/// Why a poll produced no usable record. All variants are recoverable:
/// the caller skips this cycle's update and keeps what it has.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport gave up and returned its empty sentinel.
    #[error("empty response from {0}")]
    Empty(String),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] SerdeJsonError),
    #[error("response missing '{0}' field")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    /// stop, pause, load, anything that is not "play"
    Stopped,
}

/// One status poll: whether the renderer plays, and the title it reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub status: PlaybackStatus,
    /// The track identity. Exact string compare, empty means "not playing".
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub artist: String,
    pub subtitle: String,
    pub title: String,
    pub album_art_uri: String,
}

impl TrackMetadata {
    /// Artist to display. The renderer reports "unknow" when it has no artist
    /// tag (radio, some streaming services); the subtitle carries it instead.
    pub fn display_artist(&self) -> &str {
        if UNKNOWN_ARTIST.contains(&self.artist.as_str()) && !self.subtitle.is_empty() {
            &self.subtitle
        } else {
            &self.artist
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaPayload {
    #[serde(rename = "metaData")]
    meta_data: Option<MetaData>,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    artist: Option<String>,
    subtitle: Option<String>,
    title: Option<String>,
    #[serde(rename = "albumArtURI")]
    album_art_uri: Option<String>,
}

/// Parse a `getPlayerStatus` body.
pub fn parse_status(body: &str) -> Result<PlayerStatus, FetchError> {
    let payload: StatusPayload = serde_json::from_str(body)?;
    let status = payload.status.ok_or(FetchError::MissingField("status"))?;
    if status == "play" {
        let title = payload.title.ok_or(FetchError::MissingField("Title"))?;
        Ok(PlayerStatus { status: PlaybackStatus::Playing, title })
    } else {
        Ok(PlayerStatus {
            status: PlaybackStatus::Stopped,
            title: payload.title.unwrap_or_default(),
        })
    }
}

/// Parse a `getMetaInfo` body. Partial records are rejected outright.
pub fn parse_meta(body: &str) -> Result<TrackMetadata, FetchError> {
    let payload: MetaPayload = serde_json::from_str(body)?;
    let meta = payload.meta_data.ok_or(FetchError::MissingField("metaData"))?;
    Ok(TrackMetadata {
        artist: meta.artist.ok_or(FetchError::MissingField("artist"))?,
        subtitle: meta.subtitle.unwrap_or_default(),
        title: meta.title.ok_or(FetchError::MissingField("title"))?,
        album_art_uri: meta.album_art_uri.ok_or(FetchError::MissingField("albumArtURI"))?,
    })
}

/// Client for the renderer's `httpapi.asp` endpoints.
#[derive(Debug, Clone)]
pub struct WiimClient<T> {
    transport: T,
    status_url: String,
    meta_url: String,
}

impl<T: HttpFetch> WiimClient<T> {
    pub fn new(transport: T, host: &str) -> Self {
        Self {
            transport,
            status_url: format!("https://{}/httpapi.asp?command=getPlayerStatus", host),
            meta_url: format!("https://{}/httpapi.asp?command=getMetaInfo", host),
        }
    }

    pub fn status_url(&self) -> &str { &self.status_url }

    pub async fn fetch_status(&self) -> Result<PlayerStatus, FetchError> {
        let body = self.fetch_body(&self.status_url).await?;
        parse_status(&body)
    }

    pub async fn fetch_track_metadata(&self) -> Result<TrackMetadata, FetchError> {
        let body = self.fetch_body(&self.meta_url).await?;
        parse_meta(&body)
    }

    async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let body = self.transport.fetch(url).await;
        if body.trim().is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }
        Ok(body)
    }
}
