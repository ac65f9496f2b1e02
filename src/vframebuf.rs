/*
 *  vframebuf.rs
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::PixelColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized framebuffer for embedded-graphics.
///
/// Everything that ends up on the panel is composed here first; the panel
/// driver only ever sees complete frames.
#[derive(Debug, Clone)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
}

impl<C: PixelColor> VarFrameBuf<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    /// Immutable raw access, row-major
    pub fn as_slice(&self) -> &[C] { &self.buf }

    /// Clear to a color
    pub fn clear_color(&mut self, color: C) {
        self.buf.fill(color);
    }

    /// Colour at (x,y), None off-buffer
    pub fn pixel(&self, x: i32, y: i32) -> Option<C> {
        self.idx(Point::new(x, y)).map(|i| self.buf[i])
    }

    /// Fill the part of `area` that lies on the buffer.
    pub fn fill_region(&mut self, area: &Rectangle, color: C) {
        let Some((x0, y0, x1, y1)) = self.clip(area) else { return };
        for y in y0..y1 {
            let row = y * self.w;
            self.buf[row + x0..row + x1].fill(color);
        }
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    /// Intersection of `area` with the buffer as half-open pixel bounds.
    fn clip(&self, area: &Rectangle) -> Option<(usize, usize, usize, usize)> {
        let Size { width, height } = area.size;
        if width == 0 || height == 0 { return None; }
        let x0 = area.top_left.x.max(0) as i64;
        let y0 = area.top_left.y.max(0) as i64;
        let x1 = (area.top_left.x as i64 + width as i64).min(self.w as i64);
        let y1 = (area.top_left.y as i64 + height as i64).min(self.h as i64);
        if x0 >= x1 || y0 >= y1 { return None; }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.clear_color(color);
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_region(area, color);
        Ok(())
    }
}
