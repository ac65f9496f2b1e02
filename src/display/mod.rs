/*
 *  display/mod.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - panel drivers and frame composition
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

// Core trait definitions
pub mod traits;
pub mod error;

// Panel drivers
pub mod drivers;

// Frame composition
pub mod compositor;

// Re-exports for convenience
pub use traits::{BoxedDriver, DisplayCapabilities, DisplayDriver};
pub use error::DisplayError;
pub use compositor::Compositor;
pub use drivers::create_driver;

/// Display mode - what the panel is currently showing
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DisplayMode {
    Clock,      // nothing playing
    NowPlaying, // album art + overlay
}
