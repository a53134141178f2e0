//! E-paper panel module.
//!
//! Image preparation, block encoding and the APDU session for EZ-Sign panels.

mod compress;
mod device;
mod pack;
mod session;

pub mod palette;
pub mod prepare;
pub mod protocol;

pub use compress::compress_literal;
pub use device::Device;
pub use pack::pack_blocks;
pub use prepare::{prepare_image, resize_crop_nearest, EncodeOptions};
pub use protocol::{build_image_frame, encode_image, encode_pixels, fragment};
pub use session::{CancelToken, SessionConfig, SessionState};
