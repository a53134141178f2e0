//! Test patterns for panel bring-up.

use anyhow::{bail, Result};
use ezsign_panel_hw::Profile;
use rand::Rng;
use std::str::FromStr;

/// Built-in pixel patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Random,
    Checker,
    HStripe,
    VStripe,
}

impl FromStr for Pattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Pattern::Random),
            "checker" => Ok(Pattern::Checker),
            "hstripe" => Ok(Pattern::HStripe),
            "vstripe" => Ok(Pattern::VStripe),
            _ => bail!("unsupported pattern: {}", s),
        }
    }
}

impl Pattern {
    /// Generates a pixel buffer for the profile.
    pub fn render<R: Rng>(&self, profile: &Profile, rng: &mut R) -> Vec<u8> {
        match self {
            Pattern::Random => random(profile, rng),
            Pattern::Checker => checker(profile),
            Pattern::HStripe => hstripe(profile),
            Pattern::VStripe => vstripe(profile),
        }
    }
}

fn random<R: Rng>(profile: &Profile, rng: &mut R) -> Vec<u8> {
    let colors = profile.colors() as u8;
    (0..profile.pixel_count())
        .map(|_| rng.gen_range(0..colors))
        .collect()
}

/// Pixel checkerboard; four-colour panels overlay 16px tiles of yellow/red.
fn checker(profile: &Profile) -> Vec<u8> {
    let colors = profile.colors();
    let mut pixels = Vec::with_capacity(profile.pixel_count());
    for y in 0..profile.height {
        for x in 0..profile.width {
            let mut c = (x + y) % 2;
            if colors > 2 && (x / 16 + y / 16) % 2 == 1 {
                c = 2 + (x / 32 + y / 32) % 2;
            }
            pixels.push((c % colors) as u8);
        }
    }
    pixels
}

/// 16 horizontal bands cycling through the palette.
fn hstripe(profile: &Profile) -> Vec<u8> {
    let colors = profile.colors();
    let band = (profile.height / 16).max(1);
    let mut pixels = Vec::with_capacity(profile.pixel_count());
    for y in 0..profile.height {
        let c = ((y / band) % colors) as u8;
        pixels.extend(std::iter::repeat(c).take(profile.width));
    }
    pixels
}

/// 16 vertical bands cycling through the palette.
fn vstripe(profile: &Profile) -> Vec<u8> {
    let colors = profile.colors();
    let band = (profile.width / 16).max(1);
    let row: Vec<u8> = (0..profile.width)
        .map(|x| ((x / band) % colors) as u8)
        .collect();
    row.repeat(profile.height)
}
