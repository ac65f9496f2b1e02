/*
 *  display/drivers/mock.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock panel driver for testing without hardware
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
use embedded_graphics::prelude::*;

use crate::display::error::DisplayError;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

use std::sync::{Arc, Mutex};

/// Mock panel driver
///
/// Records every operation and keeps a copy of the last presented frame so
/// tests can check what actually reached the panel.
#[derive(Debug, Clone)]
pub struct MockDriver {
    capabilities: DisplayCapabilities,
    state: Arc<Mutex<MockDriverState>>,
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Number of times init() was called
    pub init_count: usize,

    /// Number of frames presented
    pub flush_count: usize,

    /// Copy of the last presented frame
    pub last_frame: Vec<Rgb565>,

    /// Simulate failures (for error testing)
    pub simulate_flush_failure: bool,
}

impl MockDriver {
    pub fn new_with_size(width: u32, height: u32) -> Self {
        Self {
            capabilities: DisplayCapabilities {
                width,
                height,
            },
            state: Arc::new(Mutex::new(MockDriverState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        Arc::clone(&self.state)
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().unwrap().flush_count
    }

    /// Pixel of the last presented frame
    pub fn presented_pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        if x >= self.capabilities.width || y >= self.capabilities.height {
            return None;
        }
        let idx = (y * self.capabilities.width + x) as usize;
        self.state.lock().unwrap().last_frame.get(idx).copied()
    }

    /// Count of non-black pixels in the last presented frame
    pub fn lit_pixels(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .last_frame
            .iter()
            .filter(|&&p| p != Rgb565::BLACK)
            .count()
    }
}

impl DisplayDriver for MockDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.state.lock().unwrap().init_count += 1;
        Ok(())
    }

    fn flush(&mut self, frame: &[Rgb565]) -> Result<(), DisplayError> {
        let expected = (self.capabilities.width * self.capabilities.height) as usize;
        if frame.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: frame.len() });
        }

        let mut state = self.state.lock().unwrap();
        if state.simulate_flush_failure {
            return Err(DisplayError::Other("Simulated flush failure".to_string()));
        }
        state.flush_count += 1;
        state.last_frame = frame.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_driver_records_frames() {
        let mut driver = MockDriver::new_with_size(4, 2);
        let mut frame = vec![Rgb565::BLACK; 8];
        frame[5] = Rgb565::WHITE;

        driver.flush(&frame).unwrap();

        assert_eq!(driver.flush_count(), 1);
        assert_eq!(driver.presented_pixel(1, 1), Some(Rgb565::WHITE));
        assert_eq!(driver.lit_pixels(), 1);
    }

    #[test]
    fn test_mock_driver_buffer_size_mismatch() {
        let mut driver = MockDriver::new_with_size(4, 2);
        assert!(driver.flush(&[Rgb565::BLACK; 3]).is_err());
        assert_eq!(driver.flush_count(), 0);
    }

    #[test]
    fn test_mock_driver_simulated_failure() {
        let mut driver = MockDriver::new_with_size(4, 2);
        driver.state().lock().unwrap().simulate_flush_failure = true;
        assert!(driver.flush(&[Rgb565::BLACK; 8]).is_err());

        driver.state().lock().unwrap().simulate_flush_failure = false;
        assert!(driver.flush(&[Rgb565::BLACK; 8]).is_ok());
    }
}
