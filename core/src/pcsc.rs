//! PC/SC support for emvinfo library.
//! Can be enabled by turning `pcsc` feature on.
//!
//! ## What is PC/SC?
//! PC/SC (Personal Computer/Smart Card) is an abstraction layer for communicating with Smart Cards.
//! Contactless readers expose the card in the field as a regular smart card, so the same layer
//! reaches payment cards without depending on the reader driver.
//! Windows and macOS supports PC/SC by themselves, Linux also supports by installing pcsc-lite.
//!
//! ## Usage
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use emvinfo::pcsc::Context;
//! use emvinfo::{Card, Options, Session};
//!
//! let ctx = Context::try_new().unwrap();
//! let device = ctx.open(None).unwrap();
//! let pcsc_card = device.connect(&ctx).unwrap();
//!
//! let card = Rc::new(Card::new(Box::new(pcsc_card)));
//! let report = Session::new(Options::default()).run(card);
//! ```

use std::ffi::{CStr, CString};
use std::thread::sleep;
use std::time::Duration;

use pcsc::{Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::nfc::Handler;

const READERS_BUFFER_SIZE: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

/// PC/SC context.
pub struct Context {
    ctx: pcsc::Context,
}

impl Context {
    /// Creates a PC/SC context in user scope.
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            ctx: pcsc::Context::establish(Scope::User)?,
        })
    }

    /// Names of the readers known to the PC/SC service.
    pub fn readers(&self) -> Result<Vec<String>> {
        let mut buf = [0u8; READERS_BUFFER_SIZE];

        Ok(self
            .ctx
            .list_readers(&mut buf)?
            .map(|reader| reader.to_string_lossy().into_owned())
            .collect())
    }

    /// Finds a PC/SC device, the one whose name contains `name` if given or the first one
    /// otherwise.
    pub fn open(&self, name: Option<&str>) -> Result<Device> {
        let mut buf = [0u8; READERS_BUFFER_SIZE];
        let mut readers = self.ctx.list_readers(&mut buf)?;

        let reader = match name {
            Some(name) => readers.find(|r| r.to_string_lossy().contains(name)),
            None => readers.next(),
        };

        reader.map(Device::new).ok_or(Error::ReaderNotFound)
    }
}

/// PC/SC device handle.
pub struct Device {
    reader: CString,
}

impl Device {
    fn new(reader: &CStr) -> Self {
        debug!("Using device: {}", reader.to_string_lossy());

        Self {
            reader: reader.to_owned(),
        }
    }

    pub fn name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    /// Connects to the card put on the device after waiting them.
    pub fn connect(&self, ctx: &Context) -> Result<PcscCard> {
        // Waits for touching card, polling for each seconds.
        debug!("Waiting for a card");

        loop {
            match ctx
                .ctx
                .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            {
                Ok(card) => {
                    debug!("Connected to your card");

                    return Ok(PcscCard { card });
                }
                Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => {
                    info!("Still waiting for your card...");
                    sleep(Duration::from_secs(1));
                }
                Err(e) => return Err(Error::PcscError(e)),
            }
        }
    }
}

/// A card to be communicated through PC/SC.
pub struct PcscCard {
    card: pcsc::Card,
}

impl PcscCard {
    /// Transmits an APDU command to the card, then receives a response from them.
    pub fn transmit(&self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = self.card.transmit(tx, &mut rx)?;

        Ok(Vec::from(rx))
    }
}

impl Handler for PcscCard {
    type Error = Error;

    fn handle(&self, command: &[u8]) -> Result<Vec<u8>> {
        self.transmit(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "needs a PC/SC service with a reader"]
    fn test_list_readers() {
        let ctx = Context::try_new().unwrap();

        assert!(!ctx.readers().unwrap().is_empty());
    }
}
