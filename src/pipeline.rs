//! Per-monitor tile rendering: orientation, border crop, scale, centre crop,
//! background composition and colour blending. Everything here is a pure
//! function of its inputs.

use std::path::Path;

use image::{
    imageops::{self, FilterType},
    ImageBuffer, Rgb, RgbImage,
};

use crate::error::DecodeError;

/// Percentage of darkest and brightest pixels ignored when stretching contrast.
const AUTOCONTRAST_CUTOFF: u64 = 5;
/// Absorbs float error so e.g. 1000 * 1.92 scales to 1920, not 1919.
const SCALE_EPSILON: f64 = 1e-6;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub pre_rotate: bool,
    pub crop: bool,
    pub fill: bool,
    pub blend: bool,
    /// 0 is pure background, 1 is pure image.
    pub blend_ratio: f32,
    pub background: Rgb<u8>,
}

pub fn decode(path: &Path) -> Result<RgbImage, DecodeError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| DecodeError {
            path: path.to_path_buf(),
            source,
        })
}

/// Renders `source` into a tile of exactly `target` pixels.
pub fn render(source: &RgbImage, target: (u32, u32), options: &RenderOptions) -> RgbImage {
    let (target_w, target_h) = target;
    if source.width() == 0 || source.height() == 0 || target_w == 0 || target_h == 0 {
        return solid(target, options.background);
    }

    let mut image = if options.pre_rotate && source.width() < source.height() {
        imageops::rotate90(source)
    } else {
        source.clone()
    };

    if options.crop {
        image = auto_crop(&image, BLACK);
        image = auto_crop(&image, WHITE);
    }

    let scaled = scale_to_target(&image, target, options.fill);
    let fitted = if options.fill {
        center_crop(&scaled, target)
    } else {
        scaled
    };

    let tile = compose_on_background(fitted, target, options.background);

    if options.blend {
        blend(&tile, options.background, options.blend_ratio)
    } else {
        tile
    }
}

pub fn solid(size: (u32, u32), colour: Rgb<u8>) -> RgbImage {
    ImageBuffer::from_pixel(size.0, size.1, colour)
}

/// Strips a uniform `background` border. The border is detected on a
/// contrast-stretched copy but the crop is applied to the original pixels.
pub fn auto_crop(image: &RgbImage, background: Rgb<u8>) -> RgbImage {
    let stretched = autocontrast(image, AUTOCONTRAST_CUTOFF);
    match content_bounds(&stretched, background) {
        Some((x, y, w, h)) => imageops::crop_imm(image, x, y, w, h).to_image(),
        None => image.clone(),
    }
}

/// Per-channel histogram stretch that first discards `cutoff` percent of
/// pixels from each end of the histogram.
fn autocontrast(image: &RgbImage, cutoff: u64) -> RgbImage {
    let mut histograms = [[0u64; 256]; 3];
    for px in image.pixels() {
        for (channel, value) in px.0.iter().enumerate() {
            histograms[channel][*value as usize] += 1;
        }
    }

    let total = image.width() as u64 * image.height() as u64;
    let cut = total * cutoff / 100;

    let luts: Vec<[u8; 256]> = histograms.iter().map(|h| stretch_lut(h, cut)).collect();

    let mut out = image.clone();
    for px in out.pixels_mut() {
        for (channel, value) in px.0.iter_mut().enumerate() {
            *value = luts[channel][*value as usize];
        }
    }
    out
}

fn stretch_lut(histogram: &[u64; 256], cut: u64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = i as u8;
    }

    let lo = first_past(histogram.iter().enumerate(), cut);
    let hi = first_past(histogram.iter().enumerate().rev(), cut);
    let (Some(lo), Some(hi)) = (lo, hi) else {
        return lut;
    };
    if hi <= lo {
        return lut;
    }

    let scale = 255.0 / (hi - lo) as f64;
    let offset = -(lo as f64) * scale;
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i as f64 * scale + offset).clamp(0.0, 255.0) as u8;
    }
    lut
}

/// First bucket whose running count exceeds `cut`.
fn first_past<'a>(buckets: impl Iterator<Item = (usize, &'a u64)>, cut: u64) -> Option<usize> {
    let mut seen = 0u64;
    for (index, count) in buckets {
        seen += count;
        if seen > cut {
            return Some(index);
        }
    }
    None
}

/// Bounding box `(x, y, w, h)` of every pixel that differs from `background`.
fn content_bounds(image: &RgbImage, background: Rgb<u8>) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in image.enumerate_pixels() {
        if *px == background {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Fill scales until the image covers the target, fit until it fits inside.
pub fn scale_factor(image: (u32, u32), target: (u32, u32), fill: bool) -> f64 {
    let h_scale = target.1 as f64 / image.1 as f64;
    let w_scale = target.0 as f64 / image.0 as f64;
    if fill {
        h_scale.max(w_scale)
    } else {
        h_scale.min(w_scale)
    }
}

fn scale_to_target(image: &RgbImage, target: (u32, u32), fill: bool) -> RgbImage {
    let (image_w, image_h) = image.dimensions();
    let scale = scale_factor((image_w, image_h), target, fill);

    let filter = if scale < 1.0 {
        FilterType::Lanczos3
    } else {
        FilterType::CatmullRom
    };

    let scaled_len = |len: u32| (len as f64 * scale + SCALE_EPSILON).floor() as u32;
    let (mut w, mut h) = (scaled_len(image_w), scaled_len(image_h));
    if fill {
        w = w.max(target.0);
        h = h.max(target.1);
    } else {
        w = w.clamp(1, target.0);
        h = h.clamp(1, target.1);
    }

    if (w, h) == (image_w, image_h) {
        return image.clone();
    }
    imageops::resize(image, w, h, filter)
}

fn center_crop(image: &RgbImage, target: (u32, u32)) -> RgbImage {
    let (w, h) = image.dimensions();
    if (w, h) == target {
        return image.clone();
    }
    let crop_w = target.0.min(w);
    let crop_h = target.1.min(h);
    let x = (w - crop_w) / 2;
    let y = (h - crop_h) / 2;
    imageops::crop_imm(image, x, y, crop_w, crop_h).to_image()
}

fn compose_on_background(image: RgbImage, target: (u32, u32), background: Rgb<u8>) -> RgbImage {
    if image.dimensions() == target {
        return image;
    }
    let mut canvas = solid(target, background);
    let x = target.0.saturating_sub(image.width()) / 2;
    let y = target.1.saturating_sub(image.height()) / 2;
    imageops::replace(&mut canvas, &image, x as i64, y as i64);
    canvas
}

/// Alpha-blends `tile` over a solid `background`.
pub fn blend(tile: &RgbImage, background: Rgb<u8>, ratio: f32) -> RgbImage {
    let ratio = ratio.clamp(0.0, 1.0);
    let mut out = tile.clone();
    for px in out.pixels_mut() {
        for (value, bg) in px.0.iter_mut().zip(background.0) {
            *value = (bg as f32 * (1.0 - ratio) + *value as f32 * ratio).round() as u8;
        }
    }
    out
}
