//! APDU command set and image frame encoding.
//!
//! Image data frame structure:
//! - Header: `F0 D3 00 P2 LC` (P2 = 0x01 on the last fragment of a block)
//! - Sub-header: block number, fragment number
//! - Payload: up to 250 bytes of the compressed block
//!
//! `LC` always equals 2 + payload length.

use image::{GenericImageView, Rgba};
use tracing::debug;

use super::compress::compress_literal;
use super::pack::pack_blocks;
use super::prepare::{prepare_image, EncodeOptions};
use crate::profile::Profile;
use crate::{Error, Result, MAX_FRAGMENT};

/// VERIFY PIN with the fixed panel credential.
pub const APDU_AUTHENTICATE: [u8; 9] = [0x00, 0x20, 0x00, 0x01, 0x04, 0x20, 0x09, 0x12, 0x10];

/// Starts the panel refresh after all image frames are sent.
pub const APDU_START_REFRESH: [u8; 5] = [0xF0, 0xD4, 0x85, 0x80, 0x00];

/// Reads the one-byte refresh status.
pub const APDU_POLL_STATUS: [u8; 5] = [0xF0, 0xDE, 0x00, 0x00, 0x01];

/// Image data frame class byte.
pub const IMAGE_CLA: u8 = 0xF0;

/// Image data frame instruction byte.
pub const IMAGE_INS: u8 = 0xD3;

/// Success status word.
pub const SW_OK: u16 = 0x9000;

/// Refresh status byte: refresh finished.
pub const REFRESH_DONE: u8 = 0x00;

/// Refresh status byte: refresh in progress.
pub const REFRESH_BUSY: u8 = 0x01;

/// Builds one image data frame.
pub fn build_image_frame(
    block_no: usize,
    frag_no: usize,
    payload: &[u8],
    is_last: bool,
) -> Result<Vec<u8>> {
    if block_no > 0xFF {
        return Err(Error::FrameField {
            field: "block number",
            value: block_no,
        });
    }
    if frag_no > 0xFF {
        return Err(Error::FrameField {
            field: "fragment number",
            value: frag_no,
        });
    }
    if payload.len() > MAX_FRAGMENT {
        return Err(Error::FrameField {
            field: "payload length",
            value: payload.len(),
        });
    }

    let p2 = if is_last { 0x01 } else { 0x00 };
    let lc = (2 + payload.len()) as u8;
    let mut frame = Vec::with_capacity(5 + lc as usize);
    frame.extend_from_slice(&[IMAGE_CLA, IMAGE_INS, 0x00, p2, lc]);
    frame.push(block_no as u8);
    frame.push(frag_no as u8);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Splits data into ordered fragments of at most `max` bytes.
///
/// Empty input yields one empty fragment so every block still sends a frame.
/// `max` must be within 1-250.
pub fn fragment(data: &[u8], max: usize) -> Result<Vec<&[u8]>> {
    validate_max_fragment(max)?;
    if data.is_empty() {
        return Ok(vec![data]);
    }
    Ok(data.chunks(max).collect())
}

/// Splits a raw response into its body and requires status word 90 00.
pub fn check_response(mut response: Vec<u8>) -> Result<Vec<u8>> {
    let len = response.len();
    if len < 2 {
        return Err(Error::ShortResponse(response));
    }
    let sw = u16::from_be_bytes([response[len - 2], response[len - 1]]);
    if sw != SW_OK {
        return Err(Error::Status(sw));
    }
    response.truncate(len - 2);
    Ok(response)
}

/// Checks a fragment size against the protocol limit.
pub fn validate_max_fragment(max_fragment: usize) -> Result<()> {
    if max_fragment == 0 || max_fragment > MAX_FRAGMENT {
        return Err(Error::InvalidMaxFragment(max_fragment));
    }
    Ok(())
}

/// Packs, compresses and frames a pixel buffer.
pub fn encode_pixels(profile: &Profile, pixels: &[u8], max_fragment: usize) -> Result<Vec<Vec<u8>>> {
    validate_max_fragment(max_fragment)?;
    let blocks = pack_blocks(profile, pixels)?;

    let mut frames = Vec::with_capacity(blocks.len() * 4);
    for (block_no, raw) in blocks.iter().enumerate() {
        let compressed =
            compress_literal(raw).map_err(|e| e.context(format!("compress block {block_no}")))?;
        let frags = fragment(&compressed, max_fragment)?;
        debug!(
            "Block {}: {} raw, {} compressed, {} fragments",
            block_no,
            raw.len(),
            compressed.len(),
            frags.len()
        );
        let last = frags.len() - 1;
        for (frag_no, frag) in frags.into_iter().enumerate() {
            frames.push(build_image_frame(block_no, frag_no, frag, frag_no == last)?);
        }
    }
    Ok(frames)
}

/// Prepares, packs, compresses and frames an image.
pub fn encode_image<I>(
    profile: &Profile,
    image: &I,
    max_fragment: usize,
    options: EncodeOptions,
) -> Result<Vec<Vec<u8>>>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    validate_max_fragment(max_fragment)?;
    let pixels = prepare_image(profile, image, options);
    encode_pixels(profile, &pixels, max_fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Product;
    use image::RgbaImage;

    #[test]
    fn test_image_frame_layout() {
        let frame = build_image_frame(3, 1, &[0xAA, 0xBB], true).unwrap();
        assert_eq!(frame, vec![0xF0, 0xD3, 0x00, 0x01, 0x04, 0x03, 0x01, 0xAA, 0xBB]);

        let frame = build_image_frame(0, 0, &[], false).unwrap();
        assert_eq!(frame, vec![0xF0, 0xD3, 0x00, 0x00, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_image_frame_bounds() {
        assert!(build_image_frame(255, 255, &[0; 250], false).is_ok());
        assert!(matches!(
            build_image_frame(256, 0, &[], false),
            Err(Error::FrameField { value: 256, .. })
        ));
        assert!(matches!(
            build_image_frame(0, 256, &[], false),
            Err(Error::FrameField { value: 256, .. })
        ));
        assert!(matches!(
            build_image_frame(0, 0, &[0; 251], false),
            Err(Error::FrameField { value: 251, .. })
        ));
    }

    #[test]
    fn test_check_response() {
        assert_eq!(check_response(vec![0x01, 0x90, 0x00]).unwrap(), vec![0x01]);
        assert!(check_response(vec![0x90, 0x00]).unwrap().is_empty());
        assert!(matches!(
            check_response(vec![0x6A, 0x82]),
            Err(Error::Status(0x6A82))
        ));
        assert!(matches!(
            check_response(vec![0x90]),
            Err(Error::ShortResponse(_))
        ));
    }

    #[test]
    fn test_fragment_counts() {
        let data: Vec<u8> = (0..=255).collect();
        for max in [1, 7, 100, 250] {
            let frags = fragment(&data, max).unwrap();
            assert_eq!(frags.len(), data.len().div_ceil(max));
            assert!(frags.iter().all(|f| f.len() <= max));
            assert_eq!(frags.concat(), data);
        }
    }

    #[test]
    fn test_fragment_empty() {
        let frags = fragment(&[], 250).unwrap();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].is_empty());
    }

    #[test]
    fn test_fragment_rejects_zero() {
        assert!(matches!(
            fragment(&[1, 2, 3], 0),
            Err(Error::InvalidMaxFragment(0))
        ));
        assert!(matches!(
            fragment(&[], 0),
            Err(Error::InvalidMaxFragment(0))
        ));
        assert!(matches!(
            fragment(&[1, 2, 3], 251),
            Err(Error::InvalidMaxFragment(251))
        ));
    }

    #[test]
    fn test_encode_pixels_frames() {
        let profile = Profile::from_product(Product::Quad42);
        let pixels: Vec<u8> = (0..profile.pixel_count())
            .map(|i| (i % profile.colors()) as u8)
            .collect();

        let frames = encode_pixels(&profile, &pixels, 250).unwrap();
        assert!(!frames.is_empty());
        for frame in &frames {
            assert!(frame.len() >= 7);
            assert_eq!(&frame[..2], &[0xF0, 0xD3]);
            assert_eq!(frame[4] as usize, frame.len() - 5);
        }

        // 2000-byte blocks compress to 9 + 2000 + 3 bytes: 9 fragments each.
        assert_eq!(frames.len(), profile.block_count() * 9);
        let last_flags: Vec<_> = frames.iter().filter(|f| f[3] == 0x01).collect();
        assert_eq!(last_flags.len(), profile.block_count());
        assert_eq!(frames[8][3], 0x01);
        assert_eq!(frames[8][6], 8);
        assert_eq!(frames[9][5], 1);
        assert_eq!(frames[9][6], 0);
    }

    #[test]
    fn test_encode_rejects_bad_fragment_size() {
        let profile = Profile::from_product(Product::Mono29);
        let pixels = vec![1; profile.pixel_count()];
        assert!(matches!(
            encode_pixels(&profile, &pixels, 0),
            Err(Error::InvalidMaxFragment(0))
        ));
        assert!(matches!(
            encode_pixels(&profile, &pixels, 251),
            Err(Error::InvalidMaxFragment(251))
        ));
    }

    #[test]
    fn test_encode_image() {
        let profile = Profile::from_product(Product::Mono29);
        let img = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        let frames = encode_image(&profile, &img, 100, EncodeOptions::default()).unwrap();
        // 740-byte blocks: 740 + 4 + 3 = 747 bytes, 8 fragments of 100.
        assert_eq!(frames.len(), profile.block_count() * 8);
    }
}
