/*
 *  display/drivers/fbdev.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Linux framebuffer (/dev/fbN) panel driver, RGB565
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::pixelcolor::{IntoStorage, Rgb565};
use log::info;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::display::error::DisplayError;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

const BYTES_PER_PIXEL: usize = 2;

/// Memory-mapped Linux framebuffer. Assumes a 16bpp device whose line
/// length equals `width * 2` (SPI TFT panels under fbtft / tinydrm).
pub struct FbdevDriver {
    path: PathBuf,
    capabilities: DisplayCapabilities,
    mmap: Option<MmapMut>,
}

impl FbdevDriver {
    pub fn new(path: &Path, width: u32, height: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            capabilities: DisplayCapabilities {
                width,
                height,
            },
            mmap: None,
        }
    }

    fn frame_len(&self) -> usize {
        (self.capabilities.width * self.capabilities.height) as usize
    }
}

impl DisplayDriver for FbdevDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| DisplayError::InitializationFailed(format!("{}: {}", self.path.display(), e)))?;

        let len = self.frame_len() * BYTES_PER_PIXEL;
        // SAFETY: the mapping is private to this driver and only written through `flush`
        let mmap = unsafe { MmapOptions::new().len(len).map_mut(&file)? };
        info!("Mapped {} ({}x{}, {} bytes)",
            self.path.display(), self.capabilities.width, self.capabilities.height, len);
        self.mmap = Some(mmap);
        Ok(())
    }

    fn flush(&mut self, frame: &[Rgb565]) -> Result<(), DisplayError> {
        let expected = self.frame_len();
        if frame.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: frame.len() });
        }
        let mmap = self.mmap.as_mut()
            .ok_or_else(|| DisplayError::Other("framebuffer not initialised".to_string()))?;

        for (dst, px) in mmap.chunks_exact_mut(BYTES_PER_PIXEL).zip(frame) {
            dst.copy_from_slice(&px.into_storage().to_le_bytes());
        }
        Ok(())
    }
}
