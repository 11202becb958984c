//! Frame annotation: landmark outlines, signal bars and alert banners

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::analysis::DmsAnalysis;
use crate::config::DmsConfig;
use crate::landmarks::Point;
use crate::state::AlertKind;

pub const EYE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const LIPS_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const SIGNAL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DROWSY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const YAWN_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const BAR_X: i32 = 10;
const BAR_HEIGHT: u32 = 12;
const BAR_MAX_WIDTH: u32 = 150;
/// Ratio drawn as a full bar
const BAR_FULL_SCALE: f32 = 1.0;

/// Draw the analysis onto the frame
pub fn draw(image: &mut RgbImage, analysis: &DmsAnalysis, config: &DmsConfig) {
    // Banners first so the outlines stay on top
    match analysis.alert() {
        AlertKind::Drowsy => {
            let y = image.height() as i32 / 2 - 25;
            draw_banner(image, y, 50, DROWSY_COLOR);
        }
        AlertKind::Yawn => draw_banner(image, 75, 40, YAWN_COLOR),
        AlertKind::None => {}
    }

    if let Some(geometry) = &analysis.geometry {
        draw_closed_polyline(image, &geometry.left_eye, EYE_COLOR);
        draw_closed_polyline(image, &geometry.right_eye, EYE_COLOR);
        draw_closed_polyline(image, &geometry.inner_lips, LIPS_COLOR);
    }

    if let Some(signals) = &analysis.signals {
        draw_bar(image, 20, signals.avg_ear, config.ear_threshold);
        draw_bar(image, 45, signals.mar, config.mar_threshold);
    }
}

/// Connect the points in order and close the loop
pub fn draw_closed_polyline(image: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    if points.len() < 2 {
        return;
    }
    for (i, start) in points.iter().enumerate() {
        let end = &points[(i + 1) % points.len()];
        draw_line_segment_mut(image, (start.x, start.y), (end.x, end.y), color);
    }
}

/// Two-pixel alert frame; the inside is left untouched
fn draw_banner(image: &mut RgbImage, y: i32, height: u32, color: Rgb<u8>) {
    let width = image.width().saturating_sub(100);
    if width == 0 || height == 0 {
        return;
    }
    draw_hollow_rect_mut(image, Rect::at(50, y).of_size(width, height), color);
    if width > 2 && height > 2 {
        draw_hollow_rect_mut(image, Rect::at(51, y + 1).of_size(width - 2, height - 2), color);
    }
}

/// Horizontal bar for a ratio with a tick at its threshold
fn draw_bar(image: &mut RgbImage, y: i32, value: f32, threshold: f32) {
    let width = bar_width(value);
    if width > 0 {
        draw_filled_rect_mut(image, Rect::at(BAR_X, y).of_size(width, BAR_HEIGHT), SIGNAL_COLOR);
    }
    let tick_x = (BAR_X + bar_width(threshold) as i32) as f32;
    draw_line_segment_mut(
        image,
        (tick_x, (y - 2) as f32),
        (tick_x, (y + BAR_HEIGHT as i32 + 2) as f32),
        LIPS_COLOR,
    );
}

fn bar_width(value: f32) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    ((value / BAR_FULL_SCALE).min(1.0) * BAR_MAX_WIDTH as f32) as u32
}
