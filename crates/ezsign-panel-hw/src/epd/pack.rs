//! Block packing.
//!
//! The panel consumes its image as horizontal strips of [`BLOCK_ROWS`] rows.
//! Each row is packed right to left: the first pixel in the packed stream is
//! the row's rightmost column.
//!
//! - 1 bpp: 8 pixels per byte, successive pixels at bits 0, 1, ... 7.
//! - 2 bpp: 4 pixels per byte, successive pixels at bit offsets 6, 4, 2, 0.

use super::palette::{validate_pixels, WHITE};
use crate::profile::Profile;
use crate::{Result, BLOCK_ROWS};

/// Packs a pixel buffer into one byte buffer per panel block.
///
/// Rows past the bottom of the panel are padded with white.
pub fn pack_blocks(profile: &Profile, pixels: &[u8]) -> Result<Vec<Vec<u8>>> {
    validate_pixels(profile, pixels)?;

    let white_row = vec![WHITE; profile.width];
    let block_size = profile.bytes_per_row() * BLOCK_ROWS;

    let blocks = (0..profile.block_count())
        .map(|block| {
            let mut buf = Vec::with_capacity(block_size);
            for by in 0..BLOCK_ROWS {
                let y = block * BLOCK_ROWS + by;
                let row = if y < profile.height {
                    &pixels[y * profile.width..(y + 1) * profile.width]
                } else {
                    &white_row[..]
                };
                pack_row(profile, row, &mut buf);
            }
            buf
        })
        .collect();
    Ok(blocks)
}

/// Appends one packed row to `out`.
fn pack_row(profile: &Profile, row: &[u8], out: &mut Vec<u8>) {
    let ppb = profile.pixels_per_byte();
    let width = profile.width;

    for byte_idx in 0..profile.bytes_per_row() {
        let mut v = 0u8;
        for slot in 0..ppb {
            let pixel = byte_idx * ppb + slot;
            // Columns beyond the left edge pad out the final byte.
            let px = width
                .checked_sub(pixel + 1)
                .and_then(|x| row.get(x).copied())
                .unwrap_or(WHITE);
            if profile.bits_per_pixel == 1 {
                v |= (px & 0x01) << slot;
            } else {
                v |= (px & 0x03) << (6 - 2 * slot);
            }
        }
        out.push(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epd::palette::{BLACK, RED};
    use crate::profile::Product;
    use crate::Error;

    #[test]
    fn test_block_count_and_size() {
        for profile in Profile::presets() {
            let pixels = vec![WHITE; profile.pixel_count()];
            let blocks = pack_blocks(&profile, &pixels).unwrap();
            assert_eq!(blocks.len(), profile.block_count());
            for block in &blocks {
                assert_eq!(block.len(), profile.bytes_per_row() * BLOCK_ROWS);
            }
        }
    }

    #[test]
    fn test_mono_white_and_black() {
        let profile = Profile::from_product(Product::Mono29);
        let white = pack_blocks(&profile, &vec![WHITE; profile.pixel_count()]).unwrap();
        assert!(white.iter().flatten().all(|&b| b == 0xFF));

        let black = pack_blocks(&profile, &vec![BLACK; profile.pixel_count()]).unwrap();
        // 128 rows: the last block has 8 real rows and 12 padded white rows.
        let last = black.last().unwrap();
        let bpr = profile.bytes_per_row();
        assert!(last[..8 * bpr].iter().all(|&b| b == 0x00));
        assert!(last[8 * bpr..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_mono_right_to_left_bit_order() {
        let profile = Profile::from_product(Product::Mono29);
        let mut pixels = vec![WHITE; profile.pixel_count()];
        // Rightmost column of row 0 black, and the column 9 from the right.
        pixels[profile.width - 1] = BLACK;
        pixels[profile.width - 10] = BLACK;
        let blocks = pack_blocks(&profile, &pixels).unwrap();
        assert_eq!(blocks[0][0], 0xFE);
        assert_eq!(blocks[0][1], 0xFD);
        assert_eq!(blocks[0][2], 0xFF);
    }

    #[test]
    fn test_quad_right_to_left_bit_order() {
        let profile = Profile::from_product(Product::Quad42);
        let mut pixels = vec![WHITE; profile.pixel_count()];
        pixels[profile.width - 1] = RED;
        pixels[0] = BLACK;
        let blocks = pack_blocks(&profile, &pixels).unwrap();
        // RED at bits 7..6, then three whites (0b01).
        assert_eq!(blocks[0][0], 0xD5);
        // Leftmost column lands in the low bits of the row's last byte.
        assert_eq!(blocks[0][profile.bytes_per_row() - 1], 0x54);
    }

    #[test]
    fn test_partial_byte_padded_white() {
        let profile = Profile {
            product: Product::Mono29,
            width: 10,
            height: 1,
            bits_per_pixel: 1,
        };
        let blocks = pack_blocks(&profile, &[BLACK; 10]).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0][..2], &[0x00, 0xFC]);
        assert!(blocks[0][2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_rejects_invalid_pixels() {
        let profile = Profile::from_product(Product::Mono42);
        assert!(matches!(
            pack_blocks(&profile, &[WHITE; 3]),
            Err(Error::PixelLength { .. })
        ));

        let mut pixels = vec![WHITE; profile.pixel_count()];
        pixels[5] = 3;
        assert!(matches!(
            pack_blocks(&profile, &pixels),
            Err(Error::PixelValue { index: 5, .. })
        ));
    }
}
