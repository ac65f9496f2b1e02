/*
 *  artwork.rs
 *
 *  WiiMon - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	Album art: URL derivation, fetch, decode, blit, card mask
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
use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ArtSettings;
use crate::constants::{ART_X_OFFSET, ART_Y_OFFSET, ZERO_SIZE_MARKER};
use crate::display::{Compositor, DisplayDriver, DisplayError};
use crate::transport::{HttpFetch, TransportError};
use crate::vframebuf::VarFrameBuf;

#[derive(Debug, Error)]
pub enum ArtError {
    #[error("art fetch failed: {0}")]
    Fetch(#[from] TransportError),
    #[error("art decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("art decode exceeded {0:?}")]
    DecodeTimeout(Duration),
    #[error("art decode task failed: {0}")]
    DecodeTask(String),
    #[error("card mask failed: {0}")]
    Mask(DisplayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtFormat {
    Png,
    Jpeg,
}

impl ArtFormat {
    /// The renderer's URLs say what they serve: `.png` anywhere means PNG,
    /// everything else goes to the JPEG decoder.
    pub fn from_url(url: &str) -> Self {
        if url.contains(".png") { ArtFormat::Png } else { ArtFormat::Jpeg }
    }

    /// Magic-byte detection; `None` for anything but PNG or JPEG.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(ArtFormat::Png),
            ImageFormat::Jpeg => Some(ArtFormat::Jpeg),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ArtFormat::Png => ImageFormat::Png,
            ArtFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Where to fetch art for `uri`.
///
/// URIs carrying the renderer's `size=0` marker are asked for the card size
/// directly (last occurrence rewritten); anything else goes through the
/// resize proxy.
pub fn art_url(uri: &str, size: u32, proxy: &str) -> String {
    match uri.rfind(ZERO_SIZE_MARKER) {
        Some(at) => format!(
            "{}size={}X{}{}",
            &uri[..at],
            size,
            size,
            &uri[at + ZERO_SIZE_MARKER.len()..]
        ),
        None => format!("{}?url={}&w={}&h={}", proxy, uri, size, size),
    }
}

/// What one art pass did. Failures are collected, never raised.
#[derive(Debug)]
pub struct ArtOutcome {
    pub url: String,
    pub format: Option<ArtFormat>,
    pub errors: Vec<ArtError>,
}

impl ArtOutcome {
    fn new(url: String) -> Self {
        Self { url, format: None, errors: Vec::new() }
    }

    pub fn is_ok(&self) -> bool { self.errors.is_empty() }

    pub fn fetch_failed(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, ArtError::Fetch(_)))
    }
}

pub fn decode_image(bytes: &[u8], format: ArtFormat) -> Result<RgbImage, ArtError> {
    Ok(image::load_from_memory_with_format(bytes, format.image_format())?.to_rgb8())
}

/// Copy `img` into the frame with its top-left corner at `origin`, clipped.
pub fn blit(frame: &mut VarFrameBuf<Rgb565>, img: &RgbImage, origin: Point) {
    let pixels = img.enumerate_pixels().map(|(x, y, p)| {
        Pixel(
            origin + Point::new(x as i32, y as i32),
            Rgb565::from(Rgb888::new(p[0], p[1], p[2])),
        )
    });
    frame.draw_iter(pixels).unwrap_or_else(|e| match e {});
}

/// Fetches, decodes and paints album art into the compositor's frame.
#[derive(Debug, Clone)]
pub struct ArtPipeline<T> {
    transport: T,
    settings: ArtSettings,
}

impl<T: HttpFetch> ArtPipeline<T> {
    pub fn new(transport: T, settings: ArtSettings) -> Self {
        Self { transport, settings }
    }

    pub fn url_for(&self, uri: &str) -> String {
        art_url(uri, self.settings.size, &self.settings.proxy)
    }

    /// Paint art for `uri`. The frame is left composed but not presented.
    ///
    /// A failed fetch leaves a black frame. A failed decode leaves a black
    /// frame with the card mask. Nothing here retries.
    pub async fn acquire_and_render<D: DisplayDriver>(
        &self,
        uri: &str,
        compositor: &mut Compositor<D>,
    ) -> ArtOutcome {
        let mut outcome = ArtOutcome::new(self.url_for(uri));
        info!("Album art {}", outcome.url);

        let bytes = match self.transport.fetch_bytes(&outcome.url, self.settings.timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Album art fetch failed: {}", e);
                compositor.clear();
                outcome.errors.push(e.into());
                return outcome;
            }
        };

        compositor.clear();

        let format = self.pick_format(&outcome.url, &bytes);
        outcome.format = Some(format);

        let started = Instant::now();
        match self.decode(bytes, format).await {
            Ok(img) => {
                debug!("decoded {:?} {}x{} in {:?}", format, img.width(), img.height(), started.elapsed());
                blit(compositor.frame_mut(), &img, Point::new(ART_X_OFFSET, ART_Y_OFFSET));
            }
            Err(e) => {
                warn!("Album art decode failed: {}", e);
                outcome.errors.push(e);
            }
        }

        if let Err(e) = compositor.draw_card_mask() {
            warn!("Card mask failed: {}", e);
            outcome.errors.push(ArtError::Mask(e));
        }

        outcome
    }

    fn pick_format(&self, url: &str, bytes: &[u8]) -> ArtFormat {
        let by_url = ArtFormat::from_url(url);
        if !self.settings.sniff_format {
            return by_url;
        }
        match ArtFormat::sniff(bytes) {
            Some(sniffed) if sniffed != by_url => {
                debug!("{} looks like {:?}, not {:?}", url, sniffed, by_url);
                sniffed
            }
            _ => by_url,
        }
    }

    /// Decode off the runtime threads, bounded by the decode watchdog.
    async fn decode(&self, bytes: Vec<u8>, format: ArtFormat) -> Result<RgbImage, ArtError> {
        let limit = self.settings.decode_timeout;
        let job = tokio::task::spawn_blocking(move || decode_image(&bytes, format));
        match tokio::time::timeout(limit, job).await {
            Err(_) => Err(ArtError::DecodeTimeout(limit)),
            Ok(Err(join)) => Err(ArtError::DecodeTask(join.to_string())),
            Ok(Ok(res)) => res,
        }
    }
}
