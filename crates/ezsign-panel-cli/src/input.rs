//! Image loading and cropping.

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Crop rectangle in source pixels; may extend past the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl std::str::FromStr for CropRect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            bail!("crop format must be x,y,w,h");
        }
        let mut vals = [0i64; 4];
        for (val, part) in vals.iter_mut().zip(&parts) {
            *val = part
                .trim()
                .parse()
                .with_context(|| format!("invalid crop value {:?}", part))?;
        }
        let [x, y, width, height] = vals;
        if width <= 0 || height <= 0 {
            bail!("crop width/height must be > 0");
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

/// Decodes an image file (PNG, JPEG, GIF, ...).
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to load image {}", path.display()))
}

/// Crops to the intersection of `rect` and the image bounds.
pub fn crop(img: &DynamicImage, rect: CropRect) -> Result<DynamicImage> {
    let (w, h) = img.dimensions();
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width).min(w as i64);
    let y1 = (rect.y + rect.height).min(h as i64);
    if x1 <= x0 || y1 <= y0 {
        bail!("crop rect outside image bounds");
    }
    Ok(img.crop_imm(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}
