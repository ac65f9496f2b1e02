/*
 *  display/compositor.rs
 *
 *  WiiMon - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame composition: clock face, now playing overlay, album art card
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

use chrono::{DateTime, FixedOffset};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, iso_8859_1::{FONT_8X13, FONT_10X20}};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{
    PrimitiveStyleBuilder, Rectangle, RoundedRectangle, StrokeAlignment,
};
use embedded_graphics::text::{Baseline, Text};

use crate::constants::{
    ART_MASK_CORNER_RADIUS, ART_MASK_SIZE, ART_MASK_STROKE, ART_MASK_X, ART_MASK_Y,
    CLOCK_DATE_SCALE, CLOCK_DATE_X, CLOCK_DATE_Y, CLOCK_TIME_SCALE, CLOCK_TIME_X, CLOCK_TIME_Y,
    OVERLAY_BAR_HEIGHT, OVERLAY_BAR_Y, OVERLAY_PRIMARY_Y, OVERLAY_SECONDARY_Y, OVERLAY_TEXT_X,
};
use crate::display::error::DisplayError;
use crate::display::traits::DisplayDriver;
use crate::vframebuf::VarFrameBuf;

pub const BACKGROUND: Rgb565 = Rgb565::BLACK;
pub const FOREGROUND: Rgb565 = Rgb565::WHITE;

/// Owns the one framebuffer and the panel. Every frame is composed here and
/// handed to the driver in a single `present`.
pub struct Compositor<D> {
    driver: D,
    frame: VarFrameBuf<Rgb565>,
}

impl<D: DisplayDriver> Compositor<D> {
    pub fn new(driver: D) -> Self {
        let (w, h) = driver.dimensions();
        Self {
            driver,
            frame: VarFrameBuf::new(w, h, BACKGROUND),
        }
    }

    pub fn driver(&self) -> &D { &self.driver }

    pub fn frame(&self) -> &VarFrameBuf<Rgb565> { &self.frame }

    /// Decoders write straight into the frame.
    pub fn frame_mut(&mut self) -> &mut VarFrameBuf<Rgb565> { &mut self.frame }

    /// Black out the whole frame (not presented).
    pub fn clear(&mut self) {
        self.frame.clear_color(BACKGROUND);
    }

    /// Hand the composed frame to the panel.
    pub fn present(&mut self) -> Result<(), DisplayError> {
        self.driver.flush(self.frame.as_slice())
    }

    /// Full-screen clock: large `HH:MM`, date underneath.
    pub fn render_clock(&mut self, now: &DateTime<FixedOffset>) -> Result<(), DisplayError> {
        let (time_str, date_str) = clock_strings(now);
        self.clear();

        let style = MonoTextStyle::new(&FONT_10X20, FOREGROUND);
        let mut big = Magnify::new(&mut self.frame, Point::new(CLOCK_TIME_X, CLOCK_TIME_Y), CLOCK_TIME_SCALE);
        Text::with_baseline(&time_str, Point::zero(), style, Baseline::Alphabetic).draw(&mut big)?;

        let mut medium = Magnify::new(&mut self.frame, Point::new(CLOCK_DATE_X, CLOCK_DATE_Y), CLOCK_DATE_SCALE);
        Text::with_baseline(&date_str, Point::zero(), style, Baseline::Alphabetic).draw(&mut medium)?;

        self.present()
    }

    /// Redraw only the text bar, leaving the art above it untouched.
    pub fn render_now_playing(&mut self, artist: &str, title: &str) -> Result<(), DisplayError> {
        let width = self.frame.width() as u32;
        self.frame.fill_region(
            &Rectangle::new(Point::new(0, OVERLAY_BAR_Y), Size::new(width, OVERLAY_BAR_HEIGHT)),
            BACKGROUND,
        );

        let room = width.saturating_sub(2 * OVERLAY_TEXT_X as u32);
        draw_line(&mut self.frame, title, &FONT_10X20, Point::new(OVERLAY_TEXT_X, OVERLAY_PRIMARY_Y), room)?;
        draw_line(&mut self.frame, artist, &FONT_8X13, Point::new(OVERLAY_TEXT_X, OVERLAY_SECONDARY_Y), room)?;

        self.present()
    }

    /// Stroke the rounded card outline in the background colour over the
    /// art edges. Not presented; the overlay that follows presents.
    pub fn draw_card_mask(&mut self) -> Result<(), DisplayError> {
        let card = Rectangle::new(Point::new(ART_MASK_X, ART_MASK_Y), Size::new_equal(ART_MASK_SIZE));
        let bounds = self.frame.bounding_box();
        if !bounds.contains(card.center()) || card.intersection(&bounds).is_zero_sized() {
            return Err(DisplayError::DrawingError("art card lies outside the frame".to_string()));
        }

        let style = PrimitiveStyleBuilder::new()
            .stroke_color(BACKGROUND)
            .stroke_width(ART_MASK_STROKE)
            .stroke_alignment(StrokeAlignment::Inside)
            .build();
        RoundedRectangle::with_equal_corners(card, Size::new_equal(ART_MASK_CORNER_RADIUS))
            .into_styled(style)
            .draw(&mut self.frame)?;
        Ok(())
    }
}

/// `("HH:MM", "Ddd DD Mon YYYY")` for the clock face.
pub fn clock_strings(now: &DateTime<FixedOffset>) -> (String, String) {
    (now.format("%H:%M").to_string(), now.format("%a %d %b %Y").to_string())
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn fit_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn draw_line(
    frame: &mut VarFrameBuf<Rgb565>,
    text: &str,
    font: &MonoFont<'_>,
    at: Point,
    room: u32,
) -> Result<(), DisplayError> {
    let advance = font.character_size.width + font.character_spacing;
    let line = fit_text(text, (room / advance.max(1)) as usize);
    Text::with_baseline(&line, at, MonoTextStyle::new(font, FOREGROUND), Baseline::Alphabetic)
        .draw(frame)?;
    Ok(())
}

/// Integer pixel magnification, used to get display-sized digits out of the
/// bitmap fonts. Drawing at `p` paints a `factor` square at `anchor + p * factor`.
pub struct Magnify<'a, T> {
    target: &'a mut T,
    anchor: Point,
    factor: u32,
}

impl<'a, T: DrawTarget> Magnify<'a, T> {
    pub fn new(target: &'a mut T, anchor: Point, factor: u32) -> Self {
        Self { target, anchor, factor: factor.max(1) }
    }
}

impl<T: DrawTarget> Dimensions for Magnify<'_, T> {
    fn bounding_box(&self) -> Rectangle {
        let f = self.factor as i32;
        let outer = self.target.bounding_box();
        let top_left = Point::new(
            (outer.top_left.x - self.anchor.x).div_euclid(f),
            (outer.top_left.y - self.anchor.y).div_euclid(f),
        );
        Rectangle::new(top_left, outer.size / self.factor + Size::new(1, 1))
    }
}

impl<T: DrawTarget> DrawTarget for Magnify<'_, T> {
    type Color = T::Color;
    type Error = T::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let block = Size::new_equal(self.factor);
        for Pixel(p, c) in pixels {
            let at = self.anchor + p * self.factor as i32;
            self.target.fill_solid(&Rectangle::new(at, block), c)?;
        }
        Ok(())
    }
}
