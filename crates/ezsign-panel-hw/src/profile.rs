//! Panel profiles.
//!
//! EZ-Sign ships in a 2x2 matrix of panel size (2.9" and 4.2") and colour
//! count (black/white, or black/white/yellow/red). Everything else about a
//! panel is derived from its dimensions and bit depth.

use crate::{Error, Result, BLOCK_ROWS};
use std::str::FromStr;

/// Supported EZ-Sign product variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Product {
    /// 2.9" 296x128, black/white.
    Mono29,
    /// 2.9" 296x128, black/white/yellow/red.
    Quad29,
    /// 4.2" 400x300, black/white.
    Mono42,
    /// 4.2" 400x300, black/white/yellow/red.
    #[default]
    Quad42,
}

impl Product {
    /// All preset products.
    pub const ALL: [Product; 4] = [
        Product::Mono29,
        Product::Quad29,
        Product::Mono42,
        Product::Quad42,
    ];

    /// Returns the product identifier string.
    pub fn id(&self) -> &'static str {
        match self {
            Product::Mono29 => "2.9-2c",
            Product::Quad29 => "2.9-4c",
            Product::Mono42 => "4.2-2c",
            Product::Quad42 => "4.2-4c",
        }
    }
}

impl FromStr for Product {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Product::ALL
            .into_iter()
            .find(|p| p.id() == s.trim())
            .ok_or_else(|| Error::UnknownProduct(s.to_string()))
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-product panel characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub product: Product,
    pub width: usize,
    pub height: usize,
    pub bits_per_pixel: u8,
}

impl Profile {
    /// Looks up the preset profile for a product.
    pub fn from_product(product: Product) -> Self {
        let (width, height) = match product {
            Product::Mono29 | Product::Quad29 => (296, 128),
            Product::Mono42 | Product::Quad42 => (400, 300),
        };
        let bits_per_pixel = match product {
            Product::Mono29 | Product::Mono42 => 1,
            Product::Quad29 | Product::Quad42 => 2,
        };
        Self {
            product,
            width,
            height,
            bits_per_pixel,
        }
    }

    /// Returns every preset profile.
    pub fn presets() -> impl Iterator<Item = Profile> {
        Product::ALL.into_iter().map(Profile::from_product)
    }

    /// Number of palette entries (2 or 4).
    pub fn colors(&self) -> usize {
        if self.bits_per_pixel == 1 {
            2
        } else {
            4
        }
    }

    pub fn pixels_per_byte(&self) -> usize {
        if self.bits_per_pixel == 1 {
            8
        } else {
            4
        }
    }

    /// Packed bytes per panel row.
    pub fn bytes_per_row(&self) -> usize {
        self.width.div_ceil(self.pixels_per_byte())
    }

    /// Number of 20-row blocks covering the panel.
    pub fn block_count(&self) -> usize {
        self.height.div_ceil(BLOCK_ROWS)
    }

    /// Total pixel count.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl From<Product> for Profile {
    fn from(product: Product) -> Self {
        Profile::from_product(product)
    }
}
