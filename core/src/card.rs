use crate::nfc::{self, Command, Response};
use crate::tlv;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while exchanging {label} with the reader: {source}")]
    Transport {
        label: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The card rejected {label}: {status}")]
    Protocol {
        label: &'static str,
        #[source]
        status: nfc::Error,
    },

    #[error("Malformed data: {0}")]
    Malformed(#[from] tlv::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} rejected")]
    Rejected(&'static str),
}

impl Error {
    /// Whether the card answered, but with a status other than success.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// An adapter to communicate with the card through the delegate.
///
/// Every command is a strict call/response pair: one exchange per call, no retries.
pub struct Card<T>
where
    T: nfc::Handler,
{
    delegate: Box<T>,
}

impl<T> Card<T>
where
    T: nfc::Handler,
{
    /// Initiates an adapter with the delegate.
    pub fn new(delegate: Box<T>) -> Self {
        Self { delegate }
    }

    /// Borrows the handler the commands are sent through.
    pub fn delegate(&self) -> &T {
        &self.delegate
    }

    /// Sends the command and returns the payload of a successful response, without
    /// its status word. `label` names the command in logs and errors.
    pub fn execute(&self, command: Command, label: &'static str) -> Result<Vec<u8>> {
        let tx = Vec::from(command);
        debug!("{}: TX {}", label, hex::encode_upper(&tx));

        let mut rx = self.delegate.handle(&tx).map_err(|e| Error::Transport {
            label,
            source: Box::new(e),
        })?;

        debug!("{}: RX {}", label, hex::encode_upper(&rx));

        if rx.len() < nfc::TRAILER_LEN {
            warn!("{}: response shorter than a status word", label);
            rx = vec![0x00; nfc::TRAILER_LEN];
        }

        std::result::Result::from(Response::from(rx)).map_err(|e| Error::Protocol {
            label,
            status: e.into(),
        })
    }
}
