/*
 *  transport.rs
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
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url, header, redirect};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{CONNECT_TIMEOUT_MS, MAX_RESPONSE_BYTES, REQUEST_TIMEOUT_MS};

/// Failures below the fetch boundary. Text fetches never let these escape.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not an https url: {0}")]
    Scheme(String),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("response body exceeds {limit} bytes")]
    Oversized { limit: usize },
    #[error("response body is not UTF-8")]
    Encoding,
}

/// The network seam every upstream component fetches through.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// One GET, one bounded read. Returns the body, or an empty string on any
    /// failure; never errors.
    async fn fetch(&self, url: &str) -> String;

    /// Whole-body GET used for album art. Anything but `200 OK` is an error.
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// reqwest backed client: one connection per request, no redirects, no
/// keep-alive, certificates not verified (the renderer uses a self-signed
/// certificate on the local network).
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    limit: usize,
}

impl Transport {
    pub fn new() -> Result<Self, TransportError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(VERSION));
        headers.insert(header::CONNECTION, header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .http1_only()
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, limit: MAX_RESPONSE_BYTES })
    }

    async fn read_bounded(&self, url: &str) -> Result<String, TransportError> {
        let parsed = Url::parse(url).map_err(|_| TransportError::Scheme(url.to_string()))?;
        if parsed.scheme() != "https" {
            return Err(TransportError::Scheme(url.to_string()));
        }

        let mut response = self.client.get(parsed).send().await?;
        debug!("GET {} -> {}", url, response.status());

        if response.content_length().is_some_and(|n| n as usize > self.limit) {
            return Err(TransportError::Oversized { limit: self.limit });
        }

        let mut body = BoundedBody::new(self.limit);
        while let Some(chunk) = response.chunk().await? {
            body.push(&chunk)?;
        }
        body.into_text()
    }
}

/// Response body collected under a hard size cap.
#[derive(Debug)]
struct BoundedBody {
    bytes: Vec<u8>,
    limit: usize,
}

impl BoundedBody {
    fn new(limit: usize) -> Self {
        Self { bytes: Vec::with_capacity(limit.min(1024)), limit }
    }

    /// A body that does not fit the single read is a failed fetch, not partial JSON.
    fn push(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.bytes.len() + chunk.len() > self.limit {
            return Err(TransportError::Oversized { limit: self.limit });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn into_text(self) -> Result<String, TransportError> {
        String::from_utf8(self.bytes).map_err(|_| TransportError::Encoding)
    }
}

#[async_trait]
impl HttpFetch for Transport {
    async fn fetch(&self, url: &str) -> String {
        match self.read_bounded(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("fetch {} failed: {}", url, e);
                String::new()
            }
        }
    }

    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status(status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}


/// Scripted stand-in for the renderer and the art host.
#[cfg(test)]
pub mod fake {
    use super::{HttpFetch, TransportError};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Script {
        status: VecDeque<String>,
        meta: VecDeque<String>,
        art: Option<Vec<u8>>,
        meta_requests: usize,
        art_requests: Vec<String>,
    }

    /// Responses are queued per endpoint; the last queued body repeats.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedTransport {
        script: Arc<Mutex<Script>>,
    }

    fn next(queue: &mut VecDeque<String>) -> String {
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }

    impl ScriptedTransport {
        pub fn new() -> Self { Self::default() }

        pub fn push_status(&self, body: &str) {
            self.script.lock().unwrap().status.push_back(body.to_string());
        }

        pub fn push_meta(&self, body: &str) {
            self.script.lock().unwrap().meta.push_back(body.to_string());
        }

        /// `None` answers art requests with 404.
        pub fn set_art(&self, bytes: Option<Vec<u8>>) {
            self.script.lock().unwrap().art = bytes;
        }

        pub fn meta_requests(&self) -> usize {
            self.script.lock().unwrap().meta_requests
        }

        pub fn art_requests(&self) -> Vec<String> {
            self.script.lock().unwrap().art_requests.clone()
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedTransport {
        async fn fetch(&self, url: &str) -> String {
            let mut script = self.script.lock().unwrap();
            if url.contains("getPlayerStatus") {
                next(&mut script.status)
            } else if url.contains("getMetaInfo") {
                script.meta_requests += 1;
                next(&mut script.meta)
            } else {
                String::new()
            }
        }

        async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
            let mut script = self.script.lock().unwrap();
            script.art_requests.push(url.to_string());
            script.art.clone().ok_or(TransportError::Status(StatusCode::NOT_FOUND))
        }
    }
}
