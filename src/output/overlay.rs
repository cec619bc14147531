//! 文字与图形叠加 (text overlay on RGB frames)

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const GRAY: Rgb<u8> = Rgb([90, 90, 90]);

/// 常见系统字体 (按顺序尝试)
const FONT_CANDIDATES: [&str; 6] = [
    "assets/font/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Loads the configured font, falling back to common system fonts.
/// Returns `None` when nothing usable is found; callers draw without text.
pub fn load_font(configured: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = configured {
        match read_font(path) {
            Some(font) => return Some(font),
            None => warn!("⚠️  font {} could not be loaded, trying system fonts", path.display()),
        }
    }
    let found = FONT_CANDIDATES.iter().map(Path::new).find_map(read_font);
    if found.is_none() {
        warn!("⚠️  no font found, overlays are drawn without text");
    }
    found
}

fn read_font(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!("✅ font loaded: {}", path.display());
            Some(font)
        }
        Err(e) => {
            warn!("⚠️  {}: {}", path.display(), e);
            None
        }
    }
}

pub fn draw_label(img: &mut RgbImage, font: &FontArc, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
    draw_text_mut(img, color, x, y, PxScale::from(size), font, text);
}

/// Rectangle outline `thickness` pixels wide along the inside of the image edge.
pub fn draw_border(img: &mut RgbImage, thickness: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for t in 0..thickness.min(w / 2).min(h / 2) {
        let rect = Rect::at(t as i32, t as i32).of_size(w - 2 * t, h - 2 * t);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Horizontal bar filled to `fraction` (clamped to [0, 1]).
pub fn draw_bar(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, fraction: f64, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(width, height), GRAY);
    let filled = (width as f64 * fraction.clamp(0.0, 1.0)).round() as u32;
    if filled > 0 {
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(filled, height), color);
    }
}
