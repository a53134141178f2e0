//! Panel palettes and nearest-colour quantization.

use crate::profile::Profile;
use crate::{Error, Result};

pub const BLACK: u8 = 0;
pub const WHITE: u8 = 1;
pub const YELLOW: u8 = 2;
pub const RED: u8 = 3;

const MONO_PALETTE: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

const QUAD_PALETTE: [[u8; 3]; 4] = [[0, 0, 0], [255, 255, 255], [255, 255, 0], [255, 0, 0]];

/// Returns the palette for a profile, indexed by pixel value.
pub fn palette_for(profile: &Profile) -> &'static [[u8; 3]] {
    if profile.bits_per_pixel == 1 {
        &MONO_PALETTE
    } else {
        &QUAD_PALETTE
    }
}

/// Checks pixel buffer length and index range against a profile.
pub fn validate_pixels(profile: &Profile, pixels: &[u8]) -> Result<()> {
    let expected = profile.pixel_count();
    if pixels.len() != expected {
        return Err(Error::PixelLength {
            expected,
            actual: pixels.len(),
        });
    }
    let max = (profile.colors() - 1) as u8;
    if let Some((index, &value)) = pixels.iter().enumerate().find(|&(_, &px)| px > max) {
        return Err(Error::PixelValue { index, value, max });
    }
    Ok(())
}

/// Maps an RGB colour to the nearest palette index for the profile.
pub fn nearest_index(profile: &Profile, r: u8, g: u8, b: u8) -> u8 {
    if profile.bits_per_pixel == 2 {
        return nearest_quad_index(r, g, b);
    }

    let mut best = 0;
    let mut best_dist = i32::MAX;
    for (i, &[pr, pg, pb]) in MONO_PALETTE.iter().enumerate() {
        let d = dist_sq(r, g, b, pr, pg, pb);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best as u8
}

/// Four-colour mapping with saturation and luminance biasing.
///
/// Plain RGB distance collapses most warm tones into black or white on a
/// black/white/yellow/red panel. The adjustments below keep saturated reds
/// and yellows chromatic while leaving deep shadows black and highlights
/// white. The coefficients are tuned against real panels.
fn nearest_quad_index(r: u8, g: u8, b: u8) -> u8 {
    let mut d_black = dist_sq(r, g, b, 0, 0, 0);
    let mut d_white = dist_sq(r, g, b, 255, 255, 255);
    let mut d_yellow = dist_sq(r, g, b, 255, 255, 0);
    let mut d_red = dist_sq(r, g, b, 255, 0, 0);

    let (ri, gi, bi) = (r as i32, g as i32, b as i32);
    let max_c = ri.max(gi).max(bi) as f64;
    let min_c = ri.min(gi).min(bi) as f64;
    let sat = if max_c > 0.0 {
        (max_c - min_c) / max_c
    } else {
        0.0
    };

    let gray_penalty = (7000.0 * sat * sat) as i32;
    d_black += gray_penalty;
    d_white += gray_penalty;

    if sat > 0.12 {
        let hue_bonus = (2200.0 * sat) as i32;
        if ri > gi + 18 && ri > bi + 18 {
            d_red -= hue_bonus;
        }
        if ri > 95 && gi > 95 && bi < 165 {
            d_yellow -= hue_bonus;
        }
    }

    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luma < 58.0 {
        d_black -= (1200.0 * (1.0 - luma / 58.0)) as i32;
    }
    if luma > 220.0 {
        d_white -= (1400.0 * ((luma - 220.0) / 35.0)) as i32;
    }

    // Strict comparisons keep the black < white < yellow < red tie order.
    let mut best = BLACK;
    let mut best_dist = d_black;
    for (index, dist) in [(WHITE, d_white), (YELLOW, d_yellow), (RED, d_red)] {
        if dist < best_dist {
            best_dist = dist;
            best = index;
        }
    }
    best
}

fn dist_sq(r: u8, g: u8, b: u8, pr: u8, pg: u8, pb: u8) -> i32 {
    let dr = r as i32 - pr as i32;
    let dg = g as i32 - pg as i32;
    let db = b as i32 - pb as i32;
    dr * dr + dg * dg + db * db
}
