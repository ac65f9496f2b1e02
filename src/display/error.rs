/*
 *  display/error.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for display subsystem
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

use std::fmt;
use std::error::Error;

/// Unified error type for all display operations
#[derive(Debug)]
pub enum DisplayError {
    /// Panel could not be opened or mapped
    InitializationFailed(String),

    /// Framebuffer device I/O error
    Io(std::io::Error),

    /// Frame size does not match the panel
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Drawing operation failed
    DrawingError(String),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Display initialization failed: {}", msg),
            DisplayError::Io(err) =>
                write!(f, "Framebuffer I/O error: {}", err),
            DisplayError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Buffer size mismatch: expected {} pixels, got {}", expected, actual),
            DisplayError::DrawingError(msg) =>
                write!(f, "Drawing error: {}", msg),
            DisplayError::Other(msg) =>
                write!(f, "{}", msg),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Io(err)
    }
}

// the framebuffer's DrawTarget cannot fail
impl From<core::convert::Infallible> for DisplayError {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}
