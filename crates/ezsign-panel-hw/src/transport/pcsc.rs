//! PC/SC reader transport.

use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use std::ffi::CString;
use tracing::{debug, info};

use super::reader::{resolve_reader, ReaderSelector};
use super::Transport;
use crate::{Error, Result};

/// Returns the names of the currently attached PC/SC readers.
pub fn list_readers() -> Result<Vec<String>> {
    let ctx = Context::establish(Scope::User)?;
    let readers = reader_names(&ctx);
    // Context is released on drop.
    readers.map(|names| names.into_iter().map(|(name, _)| name).collect())
}

fn reader_names(ctx: &Context) -> Result<Vec<(String, CString)>> {
    let readers = ctx
        .list_readers_owned()
        .map_err(|e| Error::from(e).context("list readers"))?;
    Ok(readers
        .into_iter()
        .map(|c| (c.to_string_lossy().into_owned(), c))
        .collect())
}

/// Card channel through a PC/SC reader.
pub struct PcscTransport {
    ctx: Option<Context>,
    card: Option<Card>,
    reader: String,
}

impl PcscTransport {
    /// Establishes a PC/SC context and connects to the selected reader.
    ///
    /// Selection errors are raised before any card connection is attempted.
    pub fn connect(selectors: &[ReaderSelector]) -> Result<Self> {
        let ctx = Context::establish(Scope::User)
            .map_err(|e| Error::from(e).context("establish pc/sc context"))?;

        let readers = reader_names(&ctx)?;
        if readers.is_empty() {
            return Err(Error::NoReaders);
        }
        for (name, _) in &readers {
            debug!("Found PC/SC reader: {}", name);
        }

        let names: Vec<String> = readers.iter().map(|(name, _)| name.clone()).collect();
        let reader = resolve_reader(&names, selectors)?;
        let reader_c = readers
            .into_iter()
            .find(|(name, _)| *name == reader)
            .map(|(_, c)| c)
            .ok_or(Error::NoReaders)?;

        let card = ctx
            .connect(&reader_c, ShareMode::Shared, Protocols::ANY)
            .map_err(|e| Error::from(e).context(format!("connect reader {:?}", reader)))?;

        info!("Connected to reader {:?}", reader);

        Ok(Self {
            ctx: Some(ctx),
            card: Some(card),
            reader,
        })
    }

    /// Returns the connected reader name.
    pub fn reader_name(&self) -> &str {
        &self.reader
    }
}

impl Transport for PcscTransport {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let card = self.card.as_ref().ok_or(Error::Closed)?;
        let mut buf = [0u8; MAX_BUFFER_SIZE];
        let resp = card.transmit(apdu, &mut buf)?;
        Ok(resp.to_vec())
    }

    /// Disconnects the card (resetting it) and releases the context.
    ///
    /// Both steps are always attempted; the first failure is returned.
    fn close(&mut self) -> Result<()> {
        let mut first_err = None;

        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::ResetCard) {
                first_err = Some(Error::from(e).context("disconnect card"));
            }
        }
        if let Some(ctx) = self.ctx.take() {
            if let Err((_, e)) = ctx.release() {
                first_err.get_or_insert(Error::from(e).context("release pc/sc context"));
            }
        }

        debug!("Closed reader {:?}", self.reader);
        first_err.map_or(Ok(()), Err)
    }
}
