/*
 *  display/drivers/mod.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Panel driver implementations
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

pub mod fbdev;
pub mod headless;

// Mock driver for testing
#[cfg(test)]
pub mod mock;

use log::info;

use crate::config::{DisplaySettings, DriverKind};
use crate::display::error::DisplayError;
use crate::display::traits::{BoxedDriver, DisplayDriver};

/// Create and initialise the configured panel driver.
pub fn create_driver(config: &DisplaySettings) -> Result<BoxedDriver, DisplayError> {
    let mut driver: BoxedDriver = match config.driver {
        DriverKind::Fbdev => Box::new(fbdev::FbdevDriver::new(&config.device, config.width, config.height)),
        DriverKind::Headless => Box::new(headless::HeadlessDriver::new(config.width, config.height)),
    };
    driver.init()?;
    info!("Panel driver {:?} ready ({}x{})", config.driver, config.width, config.height);
    Ok(driver)
}
