//! EZ-Sign Panel Hardware Library
//!
//! Encodes images for EZ-Sign NFC e-paper panels and drives the panel over a
//! smart-card (APDU) transport: authenticate, stream compressed image blocks,
//! start the refresh and poll until the panel reports completion.

pub mod epd;
pub mod error;
pub mod profile;
pub mod transport;

pub use epd::{
    encode_image, encode_pixels, prepare_image, CancelToken, Device, EncodeOptions,
    SessionConfig, SessionState,
};
pub use error::{Error, Result};
pub use profile::{Product, Profile};
pub use transport::{resolve_reader, ReaderSelector, Transport};

#[cfg(feature = "pcsc")]
pub use transport::PcscTransport;

/// Number of panel rows carried by one image block.
pub const BLOCK_ROWS: usize = 20;

/// Largest image-data payload a single APDU may carry.
pub const MAX_FRAGMENT: usize = 250;
