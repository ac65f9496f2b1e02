/*
 *  display/traits.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for panel driver abstraction
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
use crate::display::error::DisplayError;

/// Display capabilities and metadata
#[derive(Debug, Clone)]
pub struct DisplayCapabilities {
    /// Display width in pixels
    pub width: u32,

    /// Display height in pixels
    pub height: u32,
}

/// Minimal hardware abstraction - all panel drivers must implement this trait
///
/// The compositor composes complete frames in its own framebuffer and hands
/// them over with a single `flush`; drivers never see a half drawn frame.
pub trait DisplayDriver: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Returns the display dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Prepare the panel for rendering
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Present a complete row-major RGB565 frame
    fn flush(&mut self, frame: &[Rgb565]) -> Result<(), DisplayError>;
}

impl<D: DisplayDriver + ?Sized> DisplayDriver for Box<D> {
    fn capabilities(&self) -> &DisplayCapabilities { (**self).capabilities() }
    fn init(&mut self) -> Result<(), DisplayError> { (**self).init() }
    fn flush(&mut self, frame: &[Rgb565]) -> Result<(), DisplayError> { (**self).flush(frame) }
}

/// Boxed driver, picked at runtime from configuration
pub type BoxedDriver = Box<dyn DisplayDriver>;
