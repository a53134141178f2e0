//! Literal-only LZO1X stream encoder.
//!
//! The panel firmware decompresses every image block with an LZO1X decoder.
//! Block data is small and transfer time is dominated by the refresh, so the
//! encoder only emits a single literal run followed by the end-of-stream
//! marker. Any conforming LZO1X decoder accepts the output.

use crate::{Error, Result};

/// Longest literal run encodable in the single-byte first-run form.
const SHORT_RUN_MAX: usize = 238;

/// End-of-stream marker (M4 match with zero distance).
const EOS_MARKER: [u8; 3] = [17, 0, 0];

/// Wraps `src` in an LZO1X stream made of one literal run.
///
/// Fails for inputs shorter than 4 bytes, the minimum first literal run.
pub fn compress_literal(src: &[u8]) -> Result<Vec<u8>> {
    if src.len() < 4 {
        return Err(Error::BlockTooShort(src.len()));
    }

    let t = src.len();
    let mut out = Vec::with_capacity(t + 8);
    if t <= SHORT_RUN_MAX {
        out.push((17 + t) as u8);
    } else {
        out.push(0);
        push_length(&mut out, t - 18);
    }
    out.extend_from_slice(src);
    out.extend_from_slice(&EOS_MARKER);
    Ok(out)
}

/// Base-255 length continuation: one zero byte per 255, then the remainder.
fn push_length(out: &mut Vec<u8>, mut t: usize) {
    while t > 255 {
        out.push(0);
        t -= 255;
    }
    out.push(t as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_input() {
        for len in 0..4 {
            assert!(matches!(
                compress_literal(&vec![0xAA; len]),
                Err(Error::BlockTooShort(l)) if l == len
            ));
        }
    }

    #[test]
    fn test_short_run() {
        let out = compress_literal(&[1, 2, 3, 4]).unwrap();
        assert_eq!(out, vec![21, 1, 2, 3, 4, 17, 0, 0]);

        let src = vec![0x5A; 238];
        let out = compress_literal(&src).unwrap();
        assert_eq!(out[0], 255);
        assert_eq!(out.len(), 1 + 238 + 3);
    }

    #[test]
    fn test_long_run() {
        // 239 - 18 = 221 fits in one continuation byte.
        let out = compress_literal(&vec![0; 239]).unwrap();
        assert_eq!(&out[..2], &[0, 221]);
        assert_eq!(out.len(), 2 + 239 + 3);
    }

    #[test]
    fn test_long_run_with_continuation() {
        // 740 bytes (one 2.9" mono block): 722 = 255 + 255 + 212.
        let src: Vec<u8> = (0..740).map(|i| i as u8).collect();
        let out = compress_literal(&src).unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 212]);
        assert_eq!(&out[4..4 + 740], &src[..]);
        assert_eq!(&out[out.len() - 3..], &EOS_MARKER);
    }

    #[test]
    fn test_exact_multiple_of_255() {
        // 273 - 18 = 255: no zero continuation bytes.
        let out = compress_literal(&vec![7; 273]).unwrap();
        assert_eq!(&out[..2], &[0, 255]);
    }
}
