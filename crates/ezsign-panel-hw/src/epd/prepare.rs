//! Image preparation: fit to the panel, tone-enhance and quantize.

use image::{GenericImageView, Rgba, RgbaImage};

use super::palette::{nearest_index, palette_for};
use crate::profile::Profile;

/// Lower and upper histogram percentiles used for level stretching.
const LOW_PERCENT: f64 = 0.10;
const HIGH_PERCENT: f64 = 0.90;

const GAMMA: f64 = 0.90;

/// Saturation boost applied on four-colour panels.
const QUAD_SAT_BOOST: f64 = 1.5;

/// Image quantization options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Use serpentine Floyd-Steinberg error diffusion instead of plain
    /// nearest-colour mapping.
    pub dither: bool,
}

impl EncodeOptions {
    pub fn dithered() -> Self {
        Self { dither: true }
    }
}

/// Resizes, enhances and quantizes an image into panel palette indices.
///
/// The result is row-major with exactly `width * height` entries.
pub fn prepare_image<I>(profile: &Profile, image: &I, options: EncodeOptions) -> Vec<u8>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let fitted = resize_crop_nearest(image, profile.width as u32, profile.height as u32);
    let enhanced = enhance_for_epaper(profile, fitted);
    if options.dither {
        return quantize_dithered(profile, &enhanced);
    }
    enhanced
        .pixels()
        .map(|&Rgba([r, g, b, a])| {
            nearest_index(
                profile,
                premultiply(r, a),
                premultiply(g, a),
                premultiply(b, a),
            )
        })
        .collect()
}

/// Scales with aspect-ratio preservation to cover the target box, then
/// center-crops. Sampling is nearest-neighbour.
///
/// Degenerate dimensions yield a fully transparent black image.
pub fn resize_crop_nearest<I>(image: &I, target_w: u32, target_h: u32) -> RgbaImage
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let (sw, sh) = image.dimensions();
    let mut dst = RgbaImage::new(target_w, target_h);
    if sw == 0 || sh == 0 || target_w == 0 || target_h == 0 {
        return dst;
    }

    let scale_x = target_w as f64 / sw as f64;
    let scale_y = target_h as f64 / sh as f64;
    let scale = scale_x.max(scale_y);

    let scaled_w = ((sw as f64 * scale + 0.5) as u32).max(target_w);
    let scaled_h = ((sh as f64 * scale + 0.5) as u32).max(target_h);
    let offset_x = (scaled_w - target_w) / 2;
    let offset_y = (scaled_h - target_h) / 2;

    for (x, y, px) in dst.enumerate_pixels_mut() {
        let sx = (((x + offset_x) as f64 / scale) as u32).min(sw - 1);
        let sy = (((y + offset_y) as f64 / scale) as u32).min(sh - 1);
        *px = image.get_pixel(sx, sy);
    }
    dst
}

/// Stretches levels between the 10th and 90th luma percentiles, applies a
/// mild gamma and, on four-colour panels, boosts saturation.
///
/// Images whose percentiles coincide (flat images) are returned unchanged.
fn enhance_for_epaper(profile: &Profile, src: RgbaImage) -> RgbaImage {
    let total = src.width() as usize * src.height() as usize;
    if total == 0 {
        return src;
    }

    let mut hist = [0usize; 256];
    for &Rgba([r, g, b, _]) in src.pixels() {
        hist[luma_byte(r, g, b) as usize] += 1;
    }

    let low = percentile(&hist, (total as f64 * LOW_PERCENT) as usize, 0);
    let high = percentile(&hist, (total as f64 * HIGH_PERCENT) as usize, 255);
    if high <= low {
        return src;
    }

    let scale = 255.0 / (high - low) as f64;
    let boost = profile.bits_per_pixel == 2;

    let mut dst = src;
    for px in dst.pixels_mut() {
        let Rgba([r, g, b, a]) = *px;
        let mut r = apply_levels(r, low, scale);
        let mut g = apply_levels(g, low, scale);
        let mut b = apply_levels(b, low, scale);

        if boost {
            let gray = (r as f64 + g as f64 + b as f64) / 3.0;
            r = clamp_byte(gray + (r as f64 - gray) * QUAD_SAT_BOOST);
            g = clamp_byte(gray + (g as f64 - gray) * QUAD_SAT_BOOST);
            b = clamp_byte(gray + (b as f64 - gray) * QUAD_SAT_BOOST);
        }

        *px = Rgba([r, g, b, a]);
    }
    dst
}

/// First gray level whose cumulative count reaches `target`.
fn percentile(hist: &[usize; 256], target: usize, fallback: i32) -> i32 {
    let mut cum = 0;
    for (level, &count) in hist.iter().enumerate() {
        cum += count;
        if cum >= target {
            return level as i32;
        }
    }
    fallback
}

fn apply_levels(v: u8, low: i32, scale: f64) -> u8 {
    let normalized = ((v as i32 - low) as f64 * scale / 255.0).clamp(0.0, 1.0);
    clamp_byte(255.0 * normalized.powf(GAMMA))
}

/// Serpentine Floyd-Steinberg error diffusion.
///
/// Even rows scan left to right, odd rows right to left, with the kernel
/// mirrored on reversed rows. Error that would land outside the image is
/// dropped.
fn quantize_dithered(profile: &Profile, img: &RgbaImage) -> Vec<u8> {
    let width = profile.width;
    let height = profile.height;
    let palette = palette_for(profile);

    let mut rs = Vec::with_capacity(width * height);
    let mut gs = Vec::with_capacity(width * height);
    let mut bs = Vec::with_capacity(width * height);
    for &Rgba([r, g, b, _]) in img.pixels() {
        rs.push(r as f64);
        gs.push(g as f64);
        bs.push(b as f64);
    }

    let mut pixels = vec![0u8; width * height];
    for y in 0..height {
        let reverse = y % 2 == 1;
        for step in 0..width {
            let x = if reverse { width - 1 - step } else { step };
            let i = y * width + x;

            let r = clamp_byte(rs[i]);
            let g = clamp_byte(gs[i]);
            let b = clamp_byte(bs[i]);
            let c = nearest_index(profile, r, g, b);
            pixels[i] = c;

            let [pr, pg, pb] = palette[c as usize];
            let err = [
                r as f64 - pr as f64,
                g as f64 - pg as f64,
                b as f64 - pb as f64,
            ];

            // (dx along the scan direction, dy, weight)
            let kernel: [(isize, usize, f64); 4] = [
                (1, 0, 7.0 / 16.0),
                (-1, 1, 3.0 / 16.0),
                (0, 1, 5.0 / 16.0),
                (1, 1, 1.0 / 16.0),
            ];
            for (dx, dy, weight) in kernel {
                let dx = if reverse { -dx } else { dx };
                let nx = x as isize + dx;
                let ny = y + dy;
                if nx < 0 || nx as usize >= width || ny >= height {
                    continue;
                }
                let ni = ny * width + nx as usize;
                rs[ni] += err[0] * weight;
                gs[ni] += err[1] * weight;
                bs[ni] += err[2] * weight;
            }
        }
    }
    pixels
}

/// Clamps to [0, 255], rounding half up.
fn clamp_byte(v: f64) -> u8 {
    if v < 0.0 {
        0
    } else if v > 255.0 {
        255
    } else {
        (v + 0.5) as u8
    }
}

/// Integer BT.601 luma approximation.
fn luma_byte(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8).min(255) as u8
}

/// Scales a straight-alpha channel to its premultiplied 8-bit value.
fn premultiply(v: u8, a: u8) -> u8 {
    let v16 = (v as u32 * 0x101) * a as u32 / 0xFF;
    (v16 >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epd::palette::{BLACK, RED, WHITE};
    use crate::profile::Product;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn test_mid_gray_dither() {
        let profile = Profile::from_product(Product::Mono42);
        let img = solid(profile.width as u32, profile.height as u32, [128, 128, 128]);

        let plain = prepare_image(&profile, &img, EncodeOptions::default());
        let dithered = prepare_image(&profile, &img, EncodeOptions::dithered());
        assert_eq!(plain.len(), profile.pixel_count());
        assert_eq!(dithered.len(), profile.pixel_count());

        assert_eq!(plain.iter().filter(|&&p| p == BLACK).count(), 0);
        let black = dithered.iter().filter(|&&p| p == BLACK).count();
        let white = dithered.iter().filter(|&&p| p == WHITE).count();
        assert!(black > 0 && white > 0, "black={black} white={white}");
    }

    fn small_profile(width: usize, height: usize, bits_per_pixel: u8) -> Profile {
        Profile {
            product: Product::Mono29,
            width,
            height,
            bits_per_pixel,
        }
    }

    #[test]
    fn test_dither_serpentine_kernel() {
        // Row 1 scans right to left and pushes 7/16 of its error to x - 1.
        // A left-to-right second row gives [0, 1, 1]; an unmirrored kernel
        // gives [0, 0, 1].
        let profile = small_profile(3, 2, 1);
        let values = [[100u8, 100, 100], [100, 100, 200]];
        let img = RgbaImage::from_fn(3, 2, |x, y| {
            let v = values[y as usize][x as usize];
            Rgba([v, v, v, 255])
        });
        let pixels = quantize_dithered(&profile, &img);
        assert_eq!(pixels, vec![BLACK, WHITE, BLACK, WHITE, BLACK, WHITE]);
    }

    #[test]
    fn test_dither_edge_error_dropped() {
        // In a single column only the 5/16 share straight down survives:
        // 100 -> 131.25 -> 61.25.
        let profile = small_profile(1, 3, 1);
        let img = RgbaImage::from_pixel(1, 3, Rgba([100, 100, 100, 255]));
        assert_eq!(quantize_dithered(&profile, &img), vec![BLACK, WHITE, BLACK]);
    }

    #[test]
    fn test_solid_red_on_quad() {
        let profile = Profile::from_product(Product::Quad29);
        let img = solid(10, 10, [255, 0, 0]);
        let pixels = prepare_image(&profile, &img, EncodeOptions::default());
        assert!(pixels.iter().all(|&p| p == RED));
    }

    #[test]
    fn test_resize_cover_and_center_crop() {
        // 4x2 source, left half black, right half white, into a 2x2 box:
        // scale 1.0 on height covers, width is cropped to the center columns.
        let src = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let out = resize_crop_nearest(&src, 2, 2);
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_resize_upscales() {
        let src = solid(3, 3, [10, 20, 30]);
        let out = resize_crop_nearest(&src, 9, 6);
        assert_eq!(out.dimensions(), (9, 6));
        assert!(out.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn test_resize_degenerate_source_is_blank() {
        let src = RgbaImage::new(0, 5);
        let out = resize_crop_nearest(&src, 4, 4);
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_enhance_stretches_levels() {
        let profile = Profile::from_product(Product::Mono29);
        // Half dark gray, half light gray: both ends stretch to the extremes.
        let src = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([60, 60, 60, 255])
            } else {
                Rgba([180, 180, 180, 255])
            }
        });
        let out = enhance_for_epaper(&profile, src);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(9, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_enhance_boosts_saturation_on_quad() {
        // Luma 26 and 183 become the stretch end points.
        let src = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([40, 20, 20, 128])
            } else {
                Rgba([200, 180, 160, 200])
            }
        });

        let mono = enhance_for_epaper(&small_profile(10, 10, 1), src.clone());
        assert_eq!(mono.get_pixel(0, 0).0, [29, 0, 0, 128]);
        assert_eq!(mono.get_pixel(9, 0).0, [255, 251, 221, 200]);

        let quad = enhance_for_epaper(&small_profile(10, 10, 2), src);
        assert_eq!(quad.get_pixel(0, 0).0, [39, 0, 0, 128]);
        assert_eq!(quad.get_pixel(9, 0).0, [255, 255, 210, 200]);
    }

    #[test]
    fn test_enhance_flat_image_unchanged() {
        let profile = Profile::from_product(Product::Quad42);
        let src = solid(8, 8, [90, 140, 200]);
        let out = enhance_for_epaper(&profile, src.clone());
        assert_eq!(out, src);
    }

    #[test]
    fn test_clamp_byte_rounds_half_up() {
        assert_eq!(clamp_byte(-3.0), 0);
        assert_eq!(clamp_byte(300.0), 255);
        assert_eq!(clamp_byte(1.5), 2);
        assert_eq!(clamp_byte(1.49), 1);
    }

    #[test]
    fn test_premultiply() {
        assert_eq!(premultiply(200, 255), 200);
        assert_eq!(premultiply(200, 0), 0);
        assert_eq!(premultiply(255, 128), 128);
    }
}
