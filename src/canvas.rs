use image::{imageops, ImageBuffer, Rgb, RgbImage};

use crate::{
    monitor::{MonitorDescriptor, SplitAxis},
    pipeline::solid,
};

/// Backgrounds darker than this fade toward mid-gray, brighter ones toward a
/// darker shade of themselves.
pub const GRADIENT_LUMINANCE_THRESHOLD: u8 = 64;
const MID_GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// Pixel buffer spanning the whole virtual desktop.
pub struct CompositionCanvas {
    buffer: RgbImage,
}

impl CompositionCanvas {
    pub fn new(size: (u32, u32), background: Rgb<u8>, gradient: bool) -> Self {
        let buffer = if gradient {
            vertical_gradient(size, background, gradient_end(background))
        } else {
            solid(size, background)
        };
        Self { buffer }
    }

    /// Pastes a monitor's tile, tearing it in two when the monitor straddles
    /// an axis so each piece lands on the wrapped edge it belongs to.
    pub fn place(&mut self, tile: &RgbImage, monitor: &MonitorDescriptor) {
        let (x, y) = monitor.render_offset;
        let (canvas_w, canvas_h) = self.buffer.dimensions();
        let (tile_w, tile_h) = tile.dimensions();

        match monitor.split {
            None => paste(&mut self.buffer, tile, x, y),
            Some(SplitAxis::Vertical) => {
                let split_row = monitor.rect.top.unsigned_abs().min(tile_h);
                let upper = imageops::crop_imm(tile, 0, 0, tile_w, split_row).to_image();
                let lower = imageops::crop_imm(tile, 0, split_row, tile_w, tile_h - split_row).to_image();
                paste(&mut self.buffer, &lower, x, 0);
                paste(&mut self.buffer, &upper, x, canvas_h.saturating_sub(split_row));
            }
            Some(SplitAxis::Horizontal) => {
                let split_col = monitor.rect.left.unsigned_abs().min(tile_w);
                let left = imageops::crop_imm(tile, 0, 0, split_col, tile_h).to_image();
                let right = imageops::crop_imm(tile, split_col, 0, tile_w - split_col, tile_h).to_image();
                paste(&mut self.buffer, &right, 0, y);
                paste(&mut self.buffer, &left, canvas_w.saturating_sub(split_col), y);
            }
        }
    }

    pub fn finish(&self) -> &RgbImage {
        &self.buffer
    }
}

fn paste(buffer: &mut RgbImage, piece: &RgbImage, x: u32, y: u32) {
    if piece.width() == 0 || piece.height() == 0 {
        return;
    }
    imageops::replace(buffer, piece, x as i64, y as i64);
}

pub fn luminance(colour: Rgb<u8>) -> u8 {
    let [r, g, b] = colour.0;
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

pub fn gradient_end(background: Rgb<u8>) -> Rgb<u8> {
    if luminance(background) < GRADIENT_LUMINANCE_THRESHOLD {
        MID_GRAY
    } else {
        Rgb(background.0.map(|c| c / 2))
    }
}

/// Top scanline is `start`, bottom scanline is `end`.
fn vertical_gradient(size: (u32, u32), start: Rgb<u8>, end: Rgb<u8>) -> RgbImage {
    let (width, height) = size;
    let span = height.saturating_sub(1).max(1) as f32;

    let rows: Vec<Rgb<u8>> = (0..height)
        .map(|y| {
            let t = y as f32 / span;
            let mut colour = start;
            for (c, (s, e)) in colour.0.iter_mut().zip(start.0.iter().zip(end.0)) {
                *c = (*s as f32 + (e as f32 - *s as f32) * t).round() as u8;
            }
            colour
        })
        .collect();

    ImageBuffer::from_fn(width, height, |_, y| rows[y as usize])
}
