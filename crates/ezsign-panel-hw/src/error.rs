//! Error types for the EZ-Sign panel library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when encoding for or talking to a panel.
#[derive(Error, Debug)]
pub enum Error {
    /// Product identifier not in the preset table.
    #[error("Unknown product: {0:?}")]
    UnknownProduct(String),

    /// Reader selection could not be resolved.
    #[error("Invalid reader selection: {0}")]
    ReaderSelection(String),

    /// No PC/SC readers are attached.
    #[error("No PC/SC readers found")]
    NoReaders,

    /// Fragment size outside 1..=250.
    #[error("Max fragment must be 1..250: {0}")]
    InvalidMaxFragment(usize),

    /// Poll interval or attempt count is zero.
    #[error("Invalid polling settings: {0}")]
    InvalidPolling(&'static str),

    /// Pixel buffer length does not match the profile.
    #[error("Invalid pixel length: got {actual}, want {expected}")]
    PixelLength { expected: usize, actual: usize },

    /// Pixel buffer holds an index outside the palette.
    #[error("Invalid pixel index at {index}: got {value}, max {max}")]
    PixelValue { index: usize, value: u8, max: u8 },

    /// Block too short for a literal-only compressed stream.
    #[error("Source too short for literal-only stream: {0}")]
    BlockTooShort(usize),

    /// Image data frame field out of range.
    #[error("{field} out of range: {value}")]
    FrameField { field: &'static str, value: usize },

    /// Response without a trailing status word.
    #[error("Short response: {0:02X?}")]
    ShortResponse(Vec<u8>),

    /// Response status word other than 90 00.
    #[error("status {0:04X}")]
    Status(u16),

    /// Poll status byte other than done/busy.
    #[error("Unexpected refresh status 0x{0:02X}")]
    UnexpectedRefreshStatus(u8),

    /// Panel still busy after every poll attempt.
    #[error("Refresh timeout after {0} polls")]
    RefreshTimeout(u32),

    /// Write cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Session already closed.
    #[error("Device is closed")]
    Closed,

    /// Transport failure reported by a non-PC/SC transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// PC/SC communication error.
    #[cfg(feature = "pcsc")]
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// Failure annotated with the operation in progress.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with the operation that produced it.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error beneath any context layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true for errors detected before any transport I/O.
    pub fn is_config(&self) -> bool {
        matches!(
            self.root(),
            Error::UnknownProduct(_)
                | Error::ReaderSelection(_)
                | Error::NoReaders
                | Error::InvalidMaxFragment(_)
                | Error::InvalidPolling(_)
                | Error::PixelLength { .. }
                | Error::PixelValue { .. }
        )
    }
}
