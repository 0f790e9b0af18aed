//! Communicating with the card through a contactless reader

pub mod command;

pub use apdu::Error;
pub use apdu::{Command, Response};

/// Length of the status word closing every response.
pub const TRAILER_LEN: usize = 2;

/// A handler to exchange a serialised APDU command for the raw response.
pub trait Handler {
    /// Error raised by the reader when the exchange itself fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles the APDU command.
    /// Implementations must transmit the command to the card through a reader,
    /// then receive exactly one response from them, status word included.
    /// No retries are expected.
    fn handle(&self, command: &[u8]) -> Result<Vec<u8>, Self::Error>;
}
