//! Card transport.
//!
//! The panel speaks ISO 7816 APDUs over NFC. A [`Transport`] exchanges one
//! command for one raw response (body plus trailing status word).

mod reader;

#[cfg(feature = "pcsc")]
mod pcsc;

pub use reader::{resolve_reader, ReaderSelector};

#[cfg(feature = "pcsc")]
pub use self::pcsc::{list_readers, PcscTransport};

use crate::Result;

/// A connected card channel.
///
/// Calls are strictly sequential; one command is outstanding at a time.
pub trait Transport {
    /// Sends a command APDU and returns the raw response including the
    /// trailing status word.
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>>;

    /// Releases the channel. Called at most once by the session.
    fn close(&mut self) -> Result<()>;
}
