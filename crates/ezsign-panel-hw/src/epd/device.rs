//! EZ-Sign device session.
//!
//! A write runs the panel protocol from the start every time:
//!
//! ```text
//! Idle -> Authenticated -> Streaming -> Refreshing -> Polling -> Done
//!   \_____________________________________________________/
//!                           -> Failed
//! ```
//!
//! The first error aborts the write. Nothing is retried.

use image::{GenericImageView, Rgba};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::protocol::{
    check_response, encode_image, encode_pixels, validate_max_fragment, APDU_AUTHENTICATE,
    APDU_POLL_STATUS, APDU_START_REFRESH, REFRESH_BUSY, REFRESH_DONE,
};
use super::session::{validate_polling, CancelToken, SessionConfig, SessionState};
use super::EncodeOptions;
use crate::profile::Profile;
use crate::transport::Transport;
use crate::{Error, Result};

#[cfg(feature = "pcsc")]
use crate::{profile::Product, transport::PcscTransport, transport::ReaderSelector};

/// Session with one EZ-Sign panel.
///
/// The session owns its transport exclusively. Calls must not overlap.
pub struct Device<T: Transport> {
    transport: Option<T>,
    reader: String,
    profile: Profile,
    config: SessionConfig,
    state: SessionState,
}

#[cfg(feature = "pcsc")]
impl Device<PcscTransport> {
    /// Opens a PC/SC reader for a preset product.
    ///
    /// With no selector the first attached reader is used.
    pub fn open(product: Product, selectors: &[ReaderSelector]) -> Result<Self> {
        let profile = Profile::from_product(product);
        let transport = PcscTransport::connect(selectors)?;
        let reader = transport.reader_name().to_string();
        Ok(Self::with_transport(profile, reader, transport))
    }
}

impl<T: Transport> Device<T> {
    /// Wraps an already connected transport.
    pub fn with_transport(profile: Profile, reader: impl Into<String>, transport: T) -> Self {
        Self {
            transport: Some(transport),
            reader: reader.into(),
            profile,
            config: SessionConfig::default(),
            state: SessionState::Idle,
        }
    }

    pub fn reader_name(&self) -> &str {
        &self.reader
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the state reached by the last write.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Sets the image payload size per APDU (1-250).
    pub fn set_max_fragment(&mut self, n: usize) -> Result<()> {
        validate_max_fragment(n)?;
        self.config.max_fragment = n;
        Ok(())
    }

    /// Sets refresh polling interval and attempt count (both > 0).
    pub fn set_polling(&mut self, interval: Duration, attempts: u32) -> Result<()> {
        validate_polling(interval, attempts)?;
        self.config.poll_interval = interval;
        self.config.max_poll_attempts = attempts;
        Ok(())
    }

    /// Applies a complete session configuration.
    pub fn set_config(&mut self, config: SessionConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Quantizes an image and writes it to the panel.
    pub fn write_image<I>(
        &mut self,
        image: &I,
        options: EncodeOptions,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let frames = encode_image(&self.profile, image, self.config.max_fragment, options)?;
        self.write_frames(&frames, cancel)
    }

    /// Writes a buffer of palette indices to the panel.
    pub fn write_pixels(&mut self, pixels: &[u8], cancel: &CancelToken) -> Result<()> {
        let frames = encode_pixels(&self.profile, pixels, self.config.max_fragment)?;
        self.write_frames(&frames, cancel)
    }

    /// Runs the full protocol for pre-built image frames.
    pub fn write_frames(&mut self, frames: &[Vec<u8>], cancel: &CancelToken) -> Result<()> {
        if self.transport.is_none() {
            return Err(Error::Closed);
        }

        info!(
            "Writing {} frames to {} ({})",
            frames.len(),
            self.reader,
            self.profile.product
        );

        let mut state = SessionState::Idle;
        self.state = state.clone();
        while !state.is_terminal() {
            state = match self.step(&state, frames, cancel) {
                Ok(next) => next,
                Err(e) => {
                    debug!("Write failed in state {}: {}", state, e);
                    self.state = SessionState::Failed {
                        reason: e.to_string(),
                    };
                    return Err(e);
                }
            };
            self.state = state.clone();
        }

        info!("Panel refresh complete");
        Ok(())
    }

    fn step(
        &mut self,
        state: &SessionState,
        frames: &[Vec<u8>],
        cancel: &CancelToken,
    ) -> Result<SessionState> {
        match *state {
            SessionState::Idle => self.authenticate(cancel),
            SessionState::Authenticated => Ok(SessionState::Streaming { next: 0 }),
            SessionState::Streaming { next } if next < frames.len() => {
                self.send_frame(frames, next, cancel)
            }
            SessionState::Streaming { .. } => self.start_refresh(),
            SessionState::Refreshing => Ok(SessionState::Polling { attempt: 0 }),
            SessionState::Polling { attempt } => self.poll(attempt, cancel),
            SessionState::Done | SessionState::Failed { .. } => Ok(state.clone()),
        }
    }

    fn authenticate(&mut self, cancel: &CancelToken) -> Result<SessionState> {
        cancel.check()?;
        self.transmit_expect_ok(&APDU_AUTHENTICATE)
            .map_err(|e| e.context("authenticate"))?;
        debug!("Authenticated");
        Ok(SessionState::Authenticated)
    }

    fn send_frame(
        &mut self,
        frames: &[Vec<u8>],
        index: usize,
        cancel: &CancelToken,
    ) -> Result<SessionState> {
        cancel.check()?;
        self.transmit_expect_ok(&frames[index]).map_err(|e| {
            e.context(format!("send image frame {}/{}", index + 1, frames.len()))
        })?;
        Ok(SessionState::Streaming { next: index + 1 })
    }

    fn start_refresh(&mut self) -> Result<SessionState> {
        self.transmit_expect_ok(&APDU_START_REFRESH)
            .map_err(|e| e.context("start refresh"))?;
        debug!("Refresh started");
        Ok(SessionState::Refreshing)
    }

    /// One refresh status poll. Busy (or an empty body) sleeps for the poll
    /// interval before the next attempt.
    fn poll(&mut self, attempt: u32, cancel: &CancelToken) -> Result<SessionState> {
        if attempt >= self.config.max_poll_attempts {
            return Err(Error::RefreshTimeout(attempt));
        }
        cancel.check()?;

        let data = self
            .transmit_expect_ok(&APDU_POLL_STATUS)
            .map_err(|e| e.context(format!("poll status #{}", attempt + 1)))?;
        match data.first() {
            Some(&REFRESH_DONE) => return Ok(SessionState::Done),
            Some(&REFRESH_BUSY) | None => {}
            Some(&other) => return Err(Error::UnexpectedRefreshStatus(other)),
        }

        debug!("Panel busy (poll #{})", attempt + 1);
        std::thread::sleep(self.config.poll_interval);
        Ok(SessionState::Polling {
            attempt: attempt + 1,
        })
    }

    fn transmit_expect_ok(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        check_response(transport.transmit(apdu)?)
    }

    /// Releases the transport.
    ///
    /// The transport is closed exactly once; later calls return `Ok(())`.
    pub fn close(&mut self) -> Result<()> {
        match self.transport.take() {
            Some(mut transport) => {
                let result = transport.close();
                info!("Closed device on {}", self.reader);
                result
            }
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for Device<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close device on {}: {}", self.reader, e);
        }
    }
}
