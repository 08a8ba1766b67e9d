//! Startup self-test pattern: eight vertical color bars.
//!
//! Painting the standard bar sequence right after attach is a quick way to
//! see that the descriptor ring and engine bring-up actually work: if the
//! bars show, the whole pixel path is alive before any real drawing code
//! runs.

use embedded_graphics::prelude::Point;

use crate::surface::Surface;
use crate::Color;

/// Standard ITU-R color bar sequence: white, amber, cyan, green, magenta,
/// red, blue, black.
const BARS: [(u8, u8, u8); 8] = [
    (204, 204, 204),
    (208, 208, 0),
    (0, 206, 206),
    (0, 239, 0),
    (239, 0, 239),
    (205, 0, 0),
    (0, 0, 255),
    (0, 0, 0),
];

/// Paint the bar pattern across the full surface.
///
/// Each bar is `width / 8` pixels wide; on widths that do not divide by
/// eight the rightmost columns are left untouched.
pub fn paint(surface: &mut Surface<'_>) {
    let geometry = *surface.geometry();
    let bar_width = geometry.width() / 8;
    for y in 0..geometry.height() {
        for (index, &(r, g, b)) in BARS.iter().enumerate() {
            let color = Color::new(r, g, b);
            let base = index as u32 * bar_width;
            for x in 0..bar_width {
                surface.set_pixel(Point::new((base + x) as i32, y as i32), color);
            }
        }
    }
}
