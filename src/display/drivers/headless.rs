/*
 *  display/drivers/headless.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Panel-less driver: frames are counted and dropped
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

use embedded_graphics::pixelcolor::Rgb565;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::display::error::DisplayError;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

/// Runs the whole pipeline without a panel. Useful for soak testing the
/// poll loop against a renderer from a desktop.
#[derive(Debug, Clone)]
pub struct HeadlessDriver {
    capabilities: DisplayCapabilities,
    frames: Arc<AtomicU64>,
}

impl HeadlessDriver {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            capabilities: DisplayCapabilities {
                width,
                height,
            },
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared frame counter, still readable once the driver is boxed away
    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }
}

impl DisplayDriver for HeadlessDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        debug!("headless panel {}x{}", self.capabilities.width, self.capabilities.height);
        Ok(())
    }

    fn flush(&mut self, frame: &[Rgb565]) -> Result<(), DisplayError> {
        let expected = (self.capabilities.width * self.capabilities.height) as usize;
        if frame.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: frame.len() });
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
